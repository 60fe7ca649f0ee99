//! Final report output
//!
//! The styled summary lists every target with its outcome followed by the
//! totals; `--json` prints the [`Report`] as JSON instead.

use std::fmt::Write as _;

use console::Style;

use crate::error::Result;
use crate::orchestrator::{Outcome, Report};

/// Render the human readable summary
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        Style::new()
            .bold()
            .apply_to(format!("{} summary", report.operation))
    );

    if report.results.is_empty() {
        let _ = writeln!(out, "  {}", Style::new().dim().apply_to("no targets"));
        return out;
    }

    for result in &report.results {
        let _ = match &result.outcome {
            Outcome::Succeeded { output } => writeln!(
                out,
                "  {} {}{}",
                Style::new().green().apply_to("✓"),
                result.target,
                output
                    .as_deref()
                    .map(|o| format!(" {}", Style::new().dim().apply_to(format!("({o})"))))
                    .unwrap_or_default()
            ),
            Outcome::Skipped { reason } => writeln!(
                out,
                "  {} {} {}",
                Style::new().yellow().apply_to("-"),
                result.target,
                Style::new().dim().apply_to(format!("(skipped: {reason})"))
            ),
            Outcome::Failed { error } => writeln!(
                out,
                "  {} {} {}\n{}",
                Style::new().red().apply_to("✗"),
                result.target,
                Style::new().red().bold().apply_to(error.kind()),
                indent(&error.to_string(), "      ")
            ),
            Outcome::Cancelled => writeln!(
                out,
                "  {} {} {}",
                Style::new().red().apply_to("✗"),
                result.target,
                Style::new().dim().apply_to("(cancelled)")
            ),
        };
    }

    let counts = report.counts();
    let _ = writeln!(
        out,
        "\n{} succeeded, {} skipped, {} failed, {} cancelled",
        Style::new().green().apply_to(counts.succeeded),
        counts.skipped,
        Style::new().red().apply_to(counts.failed),
        counts.cancelled
    );
    out
}

/// Serialize the report for `--json`
pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Print the report to stdout in the selected format
pub fn print(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", render_json(report)?);
    } else {
        print!("{}", render(report));
    }
    Ok(())
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
