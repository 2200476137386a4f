//! Diagnose Command
//!
//! The full pipeline for one diagnostic run: collect journal logs and
//! resource metrics, classify, assemble the grounded prompt, and stream the
//! selected provider's analysis to stdout.
//!
//! Collection failures degrade; the only error this command returns is
//! provider exhaustion, and even then the raw findings are printed first.

use std::io::Write;

use console::style;
use futures::StreamExt;
use tracing::{debug, info};

use crate::ai::provider::{ProviderKind, ProviderRegistry, ProviderSelector};
use crate::ai::{PromptAssembler, render_findings};
use crate::analyzer::{self, ClassifierRules};
use crate::collector::{self, journal};
use crate::config::Config;
use crate::types::{Category, DiagnosticContext, Result};

pub struct DiagnoseOptions {
    pub config: Config,
    /// Restrict analysis to one category.
    pub category: Option<Category>,
    /// User-supplied issue description, embedded into the prompt.
    pub issue: Option<String>,
    /// Journal window override (e.g. "1h", "7d").
    pub since: Option<String>,
    /// Force a provider to the front of the fallback order.
    pub provider: Option<ProviderKind>,
    /// Print the complete response at once instead of streaming.
    pub no_stream: bool,
}

pub async fn run(options: DiagnoseOptions) -> Result<()> {
    let config = &options.config;
    let since = options
        .since
        .as_deref()
        .unwrap_or(&config.logs.time_range)
        .to_string();

    eprintln!(
        "{} Collecting system data (last {})...",
        style("→").cyan(),
        since
    );

    let context = gather_context(config, &since, options.issue.clone()).await;
    info!(
        findings = context.findings.total(),
        degraded = context.degraded.len(),
        "Diagnostic context ready"
    );

    for note in &context.degraded {
        eprintln!("{} {}", style("warning:").yellow().bold(), note);
    }

    let assembler =
        PromptAssembler::new(config.ai.language).with_category(options.category);
    let selector = ProviderSelector::new(ProviderRegistry::builtin(), config.ai.clone());

    let outcome = selector
        .query(
            |kind| assembler.assemble(&context, kind),
            !options.no_stream,
            options.provider,
        )
        .await;

    match outcome {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                eprintln!("{} {}", style("warning:").yellow().bold(), warning);
            }
            eprintln!(
                "{} Analysis by {} ({})\n",
                style("→").cyan(),
                outcome.provider,
                outcome.model
            );
            print_stream(outcome.stream).await
        }
        Err(failure) => {
            for warning in &failure.warnings {
                eprintln!("{} {}", style("warning:").yellow().bold(), warning);
            }
            eprintln!(
                "{} No AI provider available; showing raw findings.\n",
                style("error:").red().bold()
            );
            println!("{}", render_findings(&context));
            Err(failure.into())
        }
    }
}

/// Run every collector and aggregate. Never fails; partial data arrives with
/// degraded notes attached.
async fn gather_context(config: &Config, since: &str, issue: Option<String>) -> DiagnosticContext {
    let collection = journal::collect_window(since).await;
    debug!(records = collection.records.len(), "Journal collection done");

    // The category filter narrows the report, not the classification; the
    // prompt summary still counts everything collected.
    let rules = ClassifierRules::from_config(&config.logs);
    let findings = analyzer::classify(&collection.records, &rules, config.logs.category_cap);

    let (resources, resource_notes) = collector::resources::snapshot().await;
    let os = collector::os::detect().await;

    let mut degraded = collection.degraded;
    degraded.extend(resource_notes);

    DiagnosticContext::build(findings, resources, os, issue, degraded)
}

/// Forward response chunks to stdout, flushing per chunk. Ctrl-C drops the
/// stream, which cancels the in-flight request.
async fn print_stream(mut stream: crate::ai::ChunkStream) -> Result<()> {
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{} Interrupted", style("→").yellow());
                return Ok(());
            }
            chunk = stream.next() => match chunk {
                None => break,
                Some(Ok(text)) => {
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
                Some(Err(e)) => {
                    // Mid-stream failure: partial output already reached the
                    // terminal, so no fallback. Report and stop.
                    eprintln!("\n{} response interrupted: {}", style("warning:").yellow().bold(), e);
                    break;
                }
            }
        }
    }

    println!();
    Ok(())
}
