//! CLI Output Formatting Module
//! Colorized terminal output for the zefest CLI

use colored::Colorize;

use crate::engine::updater::state::{AttemptOutcome, AttemptRecord, DeliveryStatus};

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// One line per delivery attempt
    pub fn attempt(record: &AttemptRecord) {
        let marker = match record.outcome {
            AttemptOutcome::Delivered => "✓".green().bold(),
            AttemptOutcome::Unsupported => "·".bright_black(),
            AttemptOutcome::Interrupted => "■".yellow(),
            _ => "✗".red(),
        };
        println!(
            "  {} {}. {} {} {}",
            marker,
            record.method.position(),
            record.method,
            describe_outcome(&record.outcome).bright_black(),
            format_duration_ms(record.elapsed_ms).bright_black()
        );
    }

    /// Final status line of a delivery run
    pub fn delivery_status(status: &DeliveryStatus) {
        match status {
            DeliveryStatus::Succeeded { method } => {
                Self::success(&format!("Package handed off via {}", method))
            }
            DeliveryStatus::ForcedFallback => {
                Self::warning("All methods failed; fell back to direct navigation")
            }
            DeliveryStatus::Abandoned => Self::warning("Delivery abandoned"),
            other => Self::info(&format!("Delivery status: {:?}", other)),
        }
    }
}

pub fn describe_outcome(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Delivered => "delivered".to_string(),
        AttemptOutcome::Declined { reason } => format!("declined ({})", reason),
        AttemptOutcome::Unsupported => "not available".to_string(),
        AttemptOutcome::Failed { reason } => format!("failed ({})", reason),
        AttemptOutcome::TimedOut => "timed out".to_string(),
        AttemptOutcome::Interrupted => "interrupted".to_string(),
    }
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Format a millisecond duration for attempt timings
pub fn format_duration_ms(millis: u64) -> String {
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", millis as f64 / 1000.0)
    } else {
        format!("{}m {}s", millis / 60_000, (millis % 60_000) / 1000)
    }
}
