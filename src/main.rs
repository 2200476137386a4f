use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sos_agent::ai::provider::ProviderKind;
use sos_agent::cli::commands::{config as config_cmd, diagnose};
use sos_agent::config::{Config, ConfigLoader, Language};
use sos_agent::types::Category;

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse()
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    s.parse()
}

fn parse_language(s: &str) -> Result<Language, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "sos")]
#[command(version, about = "AI-assisted Linux system diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Path to a config file (skips global config)")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect logs and system data and ask an AI provider for a diagnosis
    Diagnose {
        #[arg(
            value_parser = parse_category,
            help = "Restrict to one category: gui, hardware, drivers, services, security"
        )]
        category: Option<Category>,

        #[arg(long, short, help = "Describe the problem in your own words")]
        issue: Option<String>,

        #[arg(long, help = "Journal window, journalctl-style (e.g. 1h, 24h, 7d)")]
        since: Option<String>,

        #[arg(
            long,
            short,
            value_parser = parse_provider,
            help = "Try this provider first: openai, gemini, mercury, claude-agent"
        )]
        provider: Option<ProviderKind>,

        #[arg(long, short, value_parser = parse_language, help = "Response language: en, cs")]
        language: Option<Language>,

        #[arg(long, help = "Print the full response at once instead of streaming")]
        no_stream: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Output as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Write the default global config file
    Init {
        #[arg(long, help = "Overwrite an existing config")]
        force: bool,
    },
}

fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31msos encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Diagnose {
            category,
            issue,
            since,
            provider,
            language,
            no_stream,
        } => {
            let mut config = config;
            if let Some(language) = language {
                config.ai.language = language;
            }

            let rt = Runtime::new()?;
            rt.block_on(diagnose::run(diagnose::DiagnoseOptions {
                config,
                category,
                issue,
                since,
                provider,
                no_stream,
            }))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => config_cmd::show(&config, json)?,
            ConfigAction::Path => config_cmd::path(),
            ConfigAction::Init { force } => config_cmd::init(force)?,
        },
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(config)
}
