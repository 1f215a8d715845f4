//! Run reporting
//!
//! One line per step as it finishes, then a summary line. `--json` swaps
//! both for a single document printed at the end.

use colored::Colorize;
use serde::Serialize;

use super::orchestrator::{RunState, RunSummary};
use super::step::{StepResult, StepStatus};

/// Print the line for one finished step
pub fn print_step(result: &StepResult) {
    println!("{}", step_line(result));
}

fn step_line(result: &StepResult) -> String {
    let tag = match result.status() {
        StepStatus::Passed => "✓ PASS ".green().bold(),
        StepStatus::Failed => "✗ FAIL ".red().bold(),
        StepStatus::Errored => "! ERROR".yellow().bold(),
    };
    let request = format!("{} {}", result.request.method, result.request.url.path());
    if result.detail.is_empty() {
        format!("  {} {:<18} {}", tag, result.name, request.dimmed())
    } else {
        format!(
            "  {} {:<18} {}  {}",
            tag,
            result.name,
            request.dimmed(),
            result.detail
        )
    }
}

/// Print skipped steps and the final summary line
pub fn print_summary(summary: &RunSummary) {
    for name in &summary.skipped {
        println!("  {} {}", "- SKIP ".dimmed(), name.dimmed());
    }

    let line = summary_line(summary);
    if summary.all_passed() {
        println!("\n{}", line.green().bold());
    } else {
        println!("\n{}", line.red().bold());
    }
}

pub fn summary_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "{} passed, {} failed, {} errored, {} skipped",
        summary.passed(),
        summary.failed(),
        summary.errored(),
        summary.skipped.len()
    );
    if summary.state == RunState::Aborted {
        line.push_str(" (aborted: service unreachable)");
    }
    line
}

/// Machine-readable run report
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub state: RunState,
    pub all_passed: bool,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub steps: Vec<JsonStep<'a>>,
    pub skipped: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct JsonStep<'a> {
    pub name: &'a str,
    pub method: &'static str,
    pub url: &'a str,
    pub status: StepStatus,
    /// Transport failure kind, for errored steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub detail: &'a str,
    pub elapsed_ms: u64,
}

impl<'a> From<&'a RunSummary> for JsonReport<'a> {
    fn from(summary: &'a RunSummary) -> Self {
        Self {
            state: summary.state,
            all_passed: summary.all_passed(),
            passed: summary.passed(),
            failed: summary.failed(),
            errored: summary.errored(),
            steps: summary.results.iter().map(JsonStep::from).collect(),
            skipped: &summary.skipped,
        }
    }
}

impl<'a> From<&'a StepResult> for JsonStep<'a> {
    fn from(result: &'a StepResult) -> Self {
        let error = match &result.outcome {
            super::step::Outcome::Errored(e) => Some(e.kind()),
            _ => None,
        };
        Self {
            name: &result.name,
            method: result.request.method.as_str(),
            url: result.request.url.as_str(),
            status: result.status(),
            error,
            detail: &result.detail,
            elapsed_ms: result.elapsed.as_millis() as u64,
        }
    }
}

/// Print the run as one pretty-printed JSON document
pub fn print_json(summary: &RunSummary) -> crate::common::Result<()> {
    let report = JsonReport::from(summary);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
