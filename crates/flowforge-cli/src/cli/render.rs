//! Terminal rendering of execution reports and live pipeline events.

use console::style;
use flowforge_observe::attrs;
use flowforge_types::event::{PipelineEvent, PipelineState};
use flowforge_types::report::{ExecutionReport, StepStatus};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use super::Output;

/// `3 steps: 2 succeeded, 1 failed, 0 skipped`
pub fn summary_line(report: &ExecutionReport) -> String {
    format!(
        "{} steps: {} succeeded, {} failed, {} skipped",
        report.total_steps, report.successful, report.failed, report.skipped
    )
}

/// JSON document for `--json` report output.
pub fn report_json(report: &ExecutionReport) -> serde_json::Value {
    json!({
        "clean": report.is_clean(),
        "report": report,
        "markdown": report.to_markdown(),
    })
}

fn styled_glyph(status: StepStatus) -> String {
    let glyph = status.glyph();
    match status {
        StepStatus::Success => style(glyph).green().to_string(),
        StepStatus::Failed => style(glyph).red().to_string(),
        StepStatus::Skipped => style(glyph).yellow().to_string(),
    }
}

/// Styled multi-line report.
pub fn print_report(report: &ExecutionReport) {
    println!();
    println!(
        "  {} {}",
        style("Execution report:").bold(),
        style(&report.workflow_name).cyan()
    );
    println!("  {}", style(&report.workflow_id).dim());
    println!();
    for (i, step) in report.trace.iter().enumerate() {
        let detail = step.detail();
        println!(
            "  {:>2}. {} {} {}{}",
            i + 1,
            styled_glyph(step.status),
            style(&step.node_id).bold(),
            style(format!("({}.{})", step.service, step.action)).dim(),
            if detail.is_empty() {
                String::new()
            } else {
                format!("  {detail}")
            }
        );
    }

    if !report.dependency_violations.is_empty() {
        println!();
        println!("  {}", style("Dependency violations:").red().bold());
        for v in &report.dependency_violations {
            println!("    - {v}");
        }
    }

    println!();
    let summary = summary_line(report);
    if report.is_clean() {
        println!("  {} {summary}", style("✓").green().bold());
    } else {
        println!("  {} {summary}", style("✗").red().bold());
    }
    println!();
}

pub fn print_warnings(warnings: &[String]) {
    for w in warnings {
        println!("  {} {w}", style("!").yellow().bold());
    }
}

fn state_label(state: PipelineState) -> &'static str {
    match state {
        PipelineState::Generating => "Generating workflow...",
        PipelineState::Validating => "Validating candidate...",
        PipelineState::Executing => "Executing against simulated services...",
        PipelineState::Correcting => "Preparing correction...",
        PipelineState::Succeeded => "Workflow accepted",
        PipelineState::Persisted => "Workflow saved",
        PipelineState::Exhausted => "Out of correction attempts",
        PipelineState::Failed => "Pipeline failed",
        PipelineState::Cancelled => "Cancelled",
    }
}

/// Renders pipeline events as they arrive.
///
/// JSON mode prints one event per line. Human mode drives a spinner and
/// prints milestones above it. Quiet mode prints nothing.
pub struct EventRenderer {
    out: Output,
    spinner: Option<ProgressBar>,
}

impl EventRenderer {
    pub fn new(out: Output) -> Self {
        let spinner = out.human().then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(std::time::Duration::from_millis(80));
            spinner
        });
        Self { out, spinner }
    }

    fn line(&self, text: String) {
        match &self.spinner {
            Some(spinner) => spinner.println(text),
            None => println!("{text}"),
        }
    }

    pub fn handle(&mut self, event: &PipelineEvent) {
        if let PipelineEvent::Generation { kind, payload, .. } = event {
            if kind == "usage" {
                let input = payload["input_tokens"].as_u64().unwrap_or(0);
                let output = payload["output_tokens"].as_u64().unwrap_or(0);
                tracing::info!(
                    { attrs::GEN_AI_USAGE_INPUT_TOKENS } = input,
                    { attrs::GEN_AI_USAGE_OUTPUT_TOKENS } = output,
                    "generation usage"
                );
            }
        }

        if self.out.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
            }
            return;
        }
        if self.out.quiet {
            return;
        }

        match event {
            PipelineEvent::State { state, attempt, .. } => {
                if let Some(spinner) = &self.spinner {
                    spinner.set_message(format!("[attempt {attempt}] {}", state_label(*state)));
                }
            }
            PipelineEvent::Generation { .. } => {}
            PipelineEvent::Workflow {
                attempt, workflow, ..
            } => {
                self.line(format!(
                    "  {} attempt {attempt}: candidate '{}' ({} nodes)",
                    style("→").cyan(),
                    workflow.id,
                    workflow.nodes.len()
                ));
            }
            PipelineEvent::ExecutionReport { report, .. } => {
                let mark = if report.is_clean() {
                    style("✓").green()
                } else {
                    style("✗").red()
                };
                self.line(format!("  {mark} {}", summary_line(report)));
            }
            PipelineEvent::Correction {
                attempt,
                diagnostic,
                ..
            } => {
                self.line(format!(
                    "  {} attempt {attempt} rejected, asking for a fix",
                    style("↻").yellow()
                ));
                for l in diagnostic.lines().filter(|l| !l.trim().is_empty()) {
                    self.line(format!("      {}", style(l).dim()));
                }
            }
            PipelineEvent::WorkflowSaved {
                workflow_id,
                team,
                version,
                ..
            } => {
                self.line(format!(
                    "  {} saved {team}/{workflow_id} v{version}",
                    style("✓").green().bold()
                ));
            }
            PipelineEvent::Error { message, .. } => {
                self.line(format!("  {} {message}", style("✗").red().bold()));
            }
        }
    }

    pub fn finish(self) {
        if let Some(spinner) = self.spinner {
            spinner.finish_and_clear();
        }
    }
}
