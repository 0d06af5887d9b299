//! Error types for the scheduler.

use thiserror::Error;

use crate::scheduler::TaskId;

/// Error returned by a task callback.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A task callback failed during [`crate::Scheduler::flush`].
///
/// The failing task has already been removed from the queue; calling
/// `flush` again continues with the next task.
#[derive(Debug, Error)]
#[error("task {task_id} failed: {source}")]
pub struct FlushError {
	pub task_id: TaskId,
	#[source]
	pub source: TaskError,
}

/// Errors raised by scheduler configuration.
#[derive(Debug, Error)]
pub enum SchedulerError {
	/// Frame rate outside the supported range.
	#[error("frame rate {0} fps is outside 0..=125")]
	FrameRate(u32),

	/// Configuration text could not be parsed.
	#[error("invalid scheduler config: {0}")]
	Config(#[from] toml::de::Error),
}
