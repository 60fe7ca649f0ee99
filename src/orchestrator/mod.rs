//! Batch driver shared by all operations
//!
//! Every operation turns its target set into one [`OperationResult`] per
//! target through [`run_batch`]. A failing target is recorded and the batch
//! moves on; only cancellation stops new targets from starting.
//!
//! With `jobs > 1` targets are spread over a bounded pool of scoped worker
//! threads. Workers send `(index, result)` pairs over one channel and the
//! driver puts them back into target order, so reports never depend on
//! scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::TargetError;
use crate::tool::{CancelToken, ToolInvoker};
use crate::ui::{self, ProgressReporter};

/// What every operation gets from the current run
pub struct RunContext<'a> {
    pub config: &'a RunConfig,
    pub invoker: &'a dyn ToolInvoker,
    pub cancel: CancelToken,
    /// Suppress progress output
    pub quiet: bool,
}

impl RunContext<'_> {
    /// Run `op` over `targets` with `jobs` workers, showing progress
    pub fn batch<T, F>(
        &self,
        operation: &str,
        targets: &[T],
        jobs: usize,
        op: F,
    ) -> Vec<OperationResult>
    where
        T: Target + Sync,
        F: Fn(&T) -> Outcome + Sync,
    {
        let reporter = ui::reporter(operation, targets.len(), self.quiet);
        run_batch(targets, jobs, &self.cancel, reporter.as_ref(), op)
    }
}

/// Anything an operation can be applied to
pub trait Target {
    /// Identifier shown in reports
    fn id(&self) -> String;
}

impl Target for crate::discovery::DeviceDescriptor {
    fn id(&self) -> String {
        crate::discovery::DeviceDescriptor::id(self)
    }
}

impl Target for crate::discovery::PackageTarget {
    fn id(&self) -> String {
        crate::discovery::PackageTarget::id(self)
    }
}

/// What happened to one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded {
        /// Short note about what was done, if anything worth saying
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: TargetError,
    },
    Cancelled,
}

impl Outcome {
    pub fn succeeded() -> Self {
        Outcome::Succeeded { output: None }
    }

    pub fn succeeded_with(output: impl Into<String>) -> Self {
        Outcome::Succeeded {
            output: Some(output.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(error: TargetError) -> Self {
        if error.is_cancelled() {
            Outcome::Cancelled
        } else {
            Outcome::Failed { error }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }

    /// Failed and cancelled targets both fail the run
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. } | Outcome::Cancelled)
    }

    pub fn error(&self) -> Option<&TargetError> {
        match self {
            Outcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl From<Result<(), TargetError>> for Outcome {
    fn from(result: Result<(), TargetError>) -> Self {
        match result {
            Ok(()) => Outcome::succeeded(),
            Err(error) => Outcome::failed(error),
        }
    }
}

/// Outcome of one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub target: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl OperationResult {
    pub fn new(target: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            target: target.into(),
            outcome,
        }
    }
}

/// Aggregated results of one operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub operation: String,
    pub results: Vec<OperationResult>,
}

/// Per-outcome totals of a [`Report`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl Report {
    pub fn new(operation: impl Into<String>, results: Vec<OperationResult>) -> Self {
        Self {
            operation: operation.into(),
            results,
        }
    }

    pub fn empty(operation: impl Into<String>) -> Self {
        Self::new(operation, Vec::new())
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failure())
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for result in &self.results {
            match result.outcome {
                Outcome::Succeeded { .. } => counts.succeeded += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
                Outcome::Failed { .. } => counts.failed += 1,
                Outcome::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Process exit status for this report
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }
}

/// Apply `op` to every target
///
/// Always returns exactly one result per target, in target order. Targets not
/// yet started when `cancel` trips are reported as cancelled.
pub fn run_batch<T, F>(
    targets: &[T],
    jobs: usize,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
    op: F,
) -> Vec<OperationResult>
where
    T: Target + Sync,
    F: Fn(&T) -> Outcome + Sync,
{
    let workers = jobs.max(1).min(targets.len());
    debug!("processing {} targets with {} worker(s)", targets.len(), workers);

    let results = if workers <= 1 {
        targets
            .iter()
            .map(|target| run_one(target, cancel, reporter, &op))
            .collect()
    } else {
        run_pool(targets, workers, cancel, reporter, &op)
    };

    reporter.finish();
    if cancel.is_cancelled() {
        warn!("run cancelled, remaining targets were not started");
    }
    results
}

fn run_one<T, F>(
    target: &T,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
    op: &F,
) -> OperationResult
where
    T: Target,
    F: Fn(&T) -> Outcome,
{
    let id = target.id();
    let outcome = if cancel.is_cancelled() {
        Outcome::Cancelled
    } else {
        reporter.target_started(&id);
        let outcome = op(target);
        // A tool killed by cancellation may surface as an ordinary failure
        if cancel.is_cancelled() && outcome.is_failure() {
            Outcome::Cancelled
        } else {
            outcome
        }
    };

    match &outcome {
        Outcome::Succeeded { .. } => info!("{}: ok", id),
        Outcome::Skipped { reason } => info!("{}: skipped ({})", id, reason),
        Outcome::Failed { error } => warn!("{}: {}", id, error),
        Outcome::Cancelled => debug!("{}: cancelled", id),
    }

    let result = OperationResult::new(id, outcome);
    reporter.target_finished(&result);
    result
}

fn run_pool<T, F>(
    targets: &[T],
    workers: usize,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
    op: &F,
) -> Vec<OperationResult>
where
    T: Target + Sync,
    F: Fn(&T) -> Outcome + Sync,
{
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(target) = targets.get(index) else {
                        break;
                    };
                    let result = run_one(target, cancel, reporter, op);
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<OperationResult>> = vec![None; targets.len()];
    for (index, result) in rx {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    slots
        .into_iter()
        .zip(targets)
        .map(|(slot, target)| {
            slot.unwrap_or_else(|| OperationResult::new(target.id(), Outcome::Cancelled))
        })
        .collect()
}
