//! Progress reporting and cooperative cancellation
//!
//! Long phases report through a [`ProgressTracker`]. Callers that do not care
//! pass [`NoopTracker`]. Nested stages wrap their parent in a
//! [`SubtaskTracker`] which scales progress by the stage's share of the whole.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::{HierarchyError, Result};

/// External progress collaborator
pub trait ProgressTracker: Send + Sync {
    /// Describe the phase currently running
    fn set_message(&self, msg: &str);

    /// Add `increment` percent to the overall progress
    fn update_progress(&self, increment: f64);

    /// A phase failed with `err`
    fn report_error(&self, msg: &str, err: &HierarchyError);
}

/// Tracker that ignores every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl ProgressTracker for NoopTracker {
    fn set_message(&self, _msg: &str) {}
    fn update_progress(&self, _increment: f64) {}
    fn report_error(&self, _msg: &str, _err: &HierarchyError) {}
}

/// Tracker for one stage of a larger task
///
/// Progress reported here counts for `impact_pct` percent of the parent.
pub struct SubtaskTracker<'a> {
    parent: &'a dyn ProgressTracker,
    impact_pct: f64,
    subtask_msg: String,
}

impl<'a> SubtaskTracker<'a> {
    pub fn new(parent: &'a dyn ProgressTracker, impact_pct: f64, subtask_msg: impl Into<String>) -> Self {
        Self {
            parent,
            impact_pct,
            subtask_msg: subtask_msg.into(),
        }
    }
}

impl ProgressTracker for SubtaskTracker<'_> {
    fn set_message(&self, msg: &str) {
        self.parent
            .set_message(&format!("{}: {}", self.subtask_msg, msg));
    }

    fn update_progress(&self, increment: f64) {
        self.parent
            .update_progress(increment * self.impact_pct / 100.0);
    }

    fn report_error(&self, msg: &str, err: &HierarchyError) {
        self.parent
            .report_error(&format!("{}: {}", self.subtask_msg, msg), err);
    }
}

/// Shared cancellation signal, observed between phases
#[derive(Debug, Default, Clone)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`HierarchyError::Cancelled`] if cancellation was requested
    pub fn check(&self, phase: &str) -> Result<()> {
        if self.is_cancelled() {
            info!(phase, "Cancellation observed, aborting");
            return Err(HierarchyError::cancelled(phase));
        }
        Ok(())
    }
}

/// Run one weighted phase: announce it, check for cancellation, time it and
/// report either progress or the failure.
pub fn run_task<T>(
    msg: &str,
    weight: f64,
    tracker: &dyn ProgressTracker,
    cancel: &CancellationFlag,
    work: impl FnOnce() -> Result<T>,
) -> Result<T> {
    tracker.set_message(msg);
    cancel.check(msg)?;

    let start = Instant::now();
    match work() {
        Ok(value) => {
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            info!(phase = msg, elapsed_ms, "Phase complete");
            tracker.update_progress(weight);
            Ok(value)
        }
        Err(err) => {
            warn!(phase = msg, error = %err, "Phase failed");
            tracker.report_error(&format!("Failed {msg}"), &err);
            Err(err)
        }
    }
}

/// Async flavour of [`run_task`]; yields to the runtime after the work so a
/// host can interleave progress handling between phases.
pub async fn run_task_async<T>(
    msg: &str,
    weight: f64,
    tracker: &dyn ProgressTracker,
    cancel: &CancellationFlag,
    work: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let result = run_task(msg, weight, tracker, cancel, work);
    tokio::task::yield_now().await;
    debug!(phase = msg, "Yielded after phase");
    result
}
