//! Prompt Assembly
//!
//! Turns a `DiagnosticContext` into the single grounded prompt sent to a
//! provider. Assembly is deterministic: same context, same task, same
//! backend kind, same prompt.
//!
//! The prompt insists on evidence: every sampled log line is embedded
//! verbatim, empty categories are stamped "No entries" so the model states
//! that nothing was found instead of inventing findings, and degraded
//! collection is disclosed.

use std::fmt::Write;

use crate::ai::provider::{ProviderKind, PromptStyle};
use crate::config::Language;
use crate::types::{Category, DiagnosticContext};

/// Sample log lines embedded per category.
const MAX_SAMPLES: usize = 10;

const KB_PER_GB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    language: Language,
    category_filter: Option<Category>,
    max_samples: usize,
}

impl PromptAssembler {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            category_filter: None,
            max_samples: MAX_SAMPLES,
        }
    }

    /// Restrict the prompt to one category's findings.
    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category_filter = category;
        self
    }

    fn categories(&self) -> Vec<Category> {
        match self.category_filter {
            Some(category) => vec![category],
            None => Category::ALL.to_vec(),
        }
    }

    /// Assemble the full prompt for one provider kind.
    pub fn assemble(&self, context: &DiagnosticContext, kind: ProviderKind) -> String {
        let mut prompt = String::new();

        self.write_header(&mut prompt, context);
        self.write_issue(&mut prompt, context);
        self.write_summary(&mut prompt, context);
        self.write_samples(&mut prompt, context);
        self.write_resources(&mut prompt, context);
        self.write_degraded(&mut prompt, context);
        self.write_rules(&mut prompt, context, kind.prompt_style());

        prompt
    }

    fn write_header(&self, prompt: &mut String, context: &DiagnosticContext) {
        prompt.push_str(
            "You are a Linux system diagnostics assistant. Analyze the REAL collected \
             data below and return a concise one-page summary (max ~25 lines).\n\n",
        );

        let _ = writeln!(prompt, "System: {}", context.os.display_name());
        if let Some(kernel) = &context.os.kernel {
            let _ = writeln!(prompt, "Kernel: {}", kernel);
        }
        if let Some(pm) = context.os.package_manager {
            let _ = writeln!(prompt, "Package manager: {}", pm);
        }
        prompt.push('\n');
    }

    fn write_issue(&self, prompt: &mut String, context: &DiagnosticContext) {
        if let Some(issue) = &context.issue {
            let _ = writeln!(prompt, "User-reported issue: {}\n", issue.trim());
        }
    }

    fn write_summary(&self, prompt: &mut String, context: &DiagnosticContext) {
        prompt.push_str("Log summary (deduped, most recent first):\n");
        for category in self.categories() {
            let _ = writeln!(
                prompt,
                "- {}: {}",
                category.title(),
                context.findings.count(category)
            );
        }

        let recommendations = crate::analyzer::summarize(&context.findings);
        if !recommendations.is_empty() {
            prompt.push_str("\nAutomated pre-analysis:\n");
            for line in recommendations {
                let _ = writeln!(prompt, "- {}", line);
            }
        }
        prompt.push('\n');
    }

    fn write_samples(&self, prompt: &mut String, context: &DiagnosticContext) {
        prompt.push_str("Sample logs (verbatim evidence):\n");
        for category in self.categories() {
            let _ = writeln!(
                prompt,
                "{} (up to {}):",
                category.title(),
                self.max_samples
            );
            let records = context.findings.get(category);
            if records.is_empty() {
                // Explicit absence beats a gap the model might fill in.
                prompt.push_str("No entries - no issues found in this category\n");
            } else {
                for record in records.iter().take(self.max_samples) {
                    let _ = writeln!(prompt, "{}", record.render());
                }
            }
            prompt.push('\n');
        }
    }

    fn write_resources(&self, prompt: &mut String, context: &DiagnosticContext) {
        let resources = &context.resources;
        if resources.is_empty() {
            return;
        }

        prompt.push_str("Resources:\n");
        if let (Some(total), Some(used)) = (resources.memory_total, resources.memory_used) {
            let _ = writeln!(
                prompt,
                "- Memory: {:.1} GB used of {:.1} GB",
                used as f64 / BYTES_PER_GB,
                total as f64 / BYTES_PER_GB
            );
        }
        for disk in &resources.disks {
            let _ = writeln!(
                prompt,
                "- Disk {}: {}% used ({:.1} GB of {:.1} GB)",
                disk.mount,
                disk.used_percent,
                disk.used_kb as f64 / KB_PER_GB,
                disk.size_kb as f64 / KB_PER_GB
            );
        }
        if let Some(load) = resources.load_average {
            let _ = writeln!(
                prompt,
                "- Load average: {:.2}, {:.2}, {:.2}",
                load[0], load[1], load[2]
            );
        }
        if let Some(uptime) = &resources.uptime {
            let _ = writeln!(prompt, "- Uptime: {}", uptime);
        }
        prompt.push('\n');
    }

    fn write_degraded(&self, prompt: &mut String, context: &DiagnosticContext) {
        if context.degraded.is_empty() {
            return;
        }

        prompt.push_str("Data collection was incomplete:\n");
        for note in &context.degraded {
            let _ = writeln!(prompt, "- {}", note);
        }
        prompt.push_str("Qualify your conclusions accordingly.\n\n");
    }

    fn write_rules(&self, prompt: &mut String, context: &DiagnosticContext, style: PromptStyle) {
        prompt.push_str(
            "Your response must be a single-page summary with these sections:\n\
             1) Top findings (3-5 bullets) with severity labels, each embedding the \
             referenced log line (timestamp, unit, message).\n\
             2) Quick actions (max 5 commands), each tied to a finding. Prefer \
             diagnostics and service restarts (systemctl restart <unit>) over \
             reinstalls; reject generic maintenance commands unless tied to a finding.\n\
             3) Resources: one line with load, RAM, and the hottest mounts.\n\
             4) Security notes: include at least one log line if any; otherwise say \
             \"none seen\".\n\
             5) Next steps: 2-3 follow-up checks, log commands over destructive steps.\n\n",
        );

        prompt.push_str("Rules:\n");
        prompt.push_str("- Reference the sample logs by unit/message; do not invent data.\n");
        prompt.push_str(
            "- For categories marked \"No entries\", state that no issues were found.\n",
        );
        if let Some(pm) = context.os.package_manager {
            let _ = writeln!(
                prompt,
                "- Use {} for any package commands; this system uses no other package manager.",
                pm
            );
        }

        // Diffusion backends re-render the whole answer each step and tend to
        // echo prompt scaffolding, so the output-shape guardrails go into the
        // task content itself.
        if style == PromptStyle::Diffusion {
            prompt.push_str("- Do not repeat or echo any part of this prompt in your reply.\n");
            prompt.push_str("- No ASCII tables or box drawing; plain prose and short lists only.\n");
        }

        match self.language {
            Language::En => {}
            Language::Cs => {
                prompt.push_str("- Respond in Czech (odpověz česky).\n");
            }
        }
    }
}

/// Render raw findings for direct terminal output. Used when every AI
/// provider failed: the collected evidence is still worth showing.
pub fn render_findings(context: &DiagnosticContext) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "System: {}", context.os.display_name());
    for category in Category::ALL {
        let records = context.findings.get(category);
        let _ = writeln!(out, "\n{} ({}):", category.title(), records.len());
        if records.is_empty() {
            out.push_str("  no issues found\n");
        } else {
            for record in records.iter().take(MAX_SAMPLES) {
                let _ = writeln!(out, "  {}", record.render());
            }
        }
    }

    if !context.degraded.is_empty() {
        out.push_str("\nCollection notes:\n");
        for note in &context.degraded {
            let _ = writeln!(out, "  - {}", note);
        }
    }

    out
}

// =============================================================================
// Tests
// =============================================================================
