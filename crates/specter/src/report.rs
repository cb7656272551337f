//! Console reporting, driven by run events.

use std::io::{self, Write};

use crate::config::RunConfig;
use crate::runner::TestRun;
use crate::types::{RunSummary, TestOutcome, TestResult};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

fn styled(color: bool, code: &str, text: &str) -> String {
    if color {
        format!("{}{}{}", code, text, RESET)
    } else {
        text.to_string()
    }
}

pub fn print_header(test_count: usize, config: &RunConfig) {
    println!(
        "\n{} {}\n",
        styled(
            config.color,
            BOLD,
            &format!("specter v{}", env!("CARGO_PKG_VERSION"))
        ),
        styled(config.color, DIM, &format!("({} tests)", test_count)),
    );
}

/// Subscribes a per-test printer to the run.
pub fn install(run: &TestRun, config: &RunConfig) {
    let config = config.clone();
    run.on_test_completed(move |result| print_result(result, &config));
}

pub fn print_result(result: &TestResult, config: &RunConfig) {
    let color = config.color;
    let duration_ms = result.duration.as_secs_f64() * 1000.0;
    let timing = format!("({:.1}ms)", duration_ms);
    match &result.outcome {
        TestOutcome::Passed => {
            println!(
                "  {} {} {}",
                styled(color, GREEN, "✓"),
                result.full_name,
                styled(color, DIM, &timing),
            );
        }
        TestOutcome::Failed(failure) => {
            println!(
                "  {} {} {}",
                styled(color, RED, "✗"),
                result.full_name,
                styled(color, DIM, &timing),
            );
            let text = failure.detail.as_deref().unwrap_or(&failure.message);
            for line in text.lines() {
                println!("    {}", styled(color, RED, line));
            }
        }
        TestOutcome::Skipped(reason) => {
            println!(
                "  {} {} {}",
                styled(color, YELLOW, "○"),
                result.full_name,
                styled(color, DIM, &format!("({})", reason)),
            );
        }
    }
}

pub fn print_summary(summary: &RunSummary, config: &RunConfig) {
    let color = config.color;
    let total = summary.results.len();
    let passed = summary.passed();
    let failed = summary.failed();
    let skipped = summary.skipped();
    let total_ms = summary.total_duration.as_secs_f64() * 1000.0;

    println!();

    let mut parts = vec![styled(color, GREEN, &format!("{} passed", passed))];
    if failed > 0 {
        parts.push(styled(color, RED, &format!("{} failed", failed)));
    }
    if skipped > 0 {
        parts.push(styled(color, YELLOW, &format!("{} skipped", skipped)));
    }
    println!(
        "{} {}, {} total",
        styled(color, BOLD, "Results:"),
        parts.join(", "),
        total,
    );
    println!("{} {:.1}ms", styled(color, BOLD, "Time:"), total_ms);
    println!();

    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styling_is_suppressed_without_color() {
        assert_eq!(styled(false, RED, "plain"), "plain");
        assert_eq!(styled(true, RED, "loud"), format!("{RED}loud{RESET}"));
    }
}
