//! UI/Progress presentation layer
//!
//! This module handles:
//! - Progress reporting while a batch runs (indicatif progress bar)
//! - Silent progress for quiet, JSON and non-terminal output
//! - The final per-target summary ([`summary`])
//!
//! All progress reporting goes through the [`ProgressReporter`] trait so the
//! batch driver does not care how (or whether) progress is shown.

pub mod summary;

use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::OperationResult;

/// Progress reporter for a batch of targets
///
/// Methods take `&self`: with `--jobs` several workers report concurrently.
pub trait ProgressReporter: Send + Sync {
    /// A target is about to be processed
    fn target_started(&self, target: &str);

    /// A target is done, whatever its outcome
    fn target_finished(&self, result: &OperationResult);

    /// All targets are done
    fn finish(&self);
}

/// Interactive progress reporter with a visual progress bar
pub struct InteractiveProgressReporter {
    bar: ProgressBar,
}

impl InteractiveProgressReporter {
    pub fn new(operation: &str, total: usize) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix(operation.to_string());

        Self { bar }
    }
}

impl ProgressReporter for InteractiveProgressReporter {
    fn target_started(&self, target: &str) {
        self.bar.set_message(target.to_string());
    }

    fn target_finished(&self, result: &OperationResult) {
        if let Some(error) = result.outcome.error() {
            self.bar
                .suspend(|| eprintln!("  ✗ {}: {}", result.target, error.kind()));
        }
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// No-op reporter
#[derive(Default)]
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn target_started(&self, _target: &str) {}

    fn target_finished(&self, _result: &OperationResult) {}

    fn finish(&self) {}
}

/// Pick a reporter for the current terminal and flags
pub fn reporter(operation: &str, total: usize, quiet: bool) -> Box<dyn ProgressReporter> {
    if quiet || total == 0 || !console::Term::stderr().is_term() {
        Box::new(SilentProgressReporter)
    } else {
        Box::new(InteractiveProgressReporter::new(operation, total))
    }
}
