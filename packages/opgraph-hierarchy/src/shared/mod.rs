//! Shared constants and collaborators

pub mod constants;
pub mod progress;

pub use constants::*;
pub use progress::{run_task, run_task_async, CancellationFlag, NoopTracker, ProgressTracker, SubtaskTracker};
