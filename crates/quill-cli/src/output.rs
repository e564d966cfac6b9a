//! Terminal output formatting utilities.

use colored::Colorize;
use quill_core::{OperationKind, OperationOutcome, RunReport, RunStatus};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message.
pub fn info(msg: &str) {
    println!("{} {}", "→".blue(), msg);
}

/// Print essential machine-readable output (for piping, like PR URLs).
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Print a run report for human consumption.
pub fn print_report(report: &RunReport) {
    for record in &report.history {
        let label = operation_label(&record.operation);
        match &record.outcome {
            OperationOutcome::Success { details } => {
                if let Some(url) = details.get("url").and_then(serde_json::Value::as_str) {
                    success(&format!("{label} {}", record.arguments));
                    essential(url);
                } else {
                    success(&format!("{label} {}", record.arguments));
                }
            }
            OperationOutcome::Failure { kind, message } => {
                warn(&format!("{label} {} - {message}", failure_label(*kind)));
            }
        }
    }

    match &report.status {
        RunStatus::Completed => success("run completed"),
        RunStatus::FatalError { reason } => error(&format!("run failed: {reason}")),
    }
}

/// Snake-case label for an operation, matching the wire format.
fn operation_label(operation: &OperationKind) -> String {
    serde_json::to_value(operation)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Snake-case label for a failure kind, matching the wire format.
fn failure_label(kind: quill_core::FailureKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "failure".to_string())
}
