use std::time::Duration;

use crate::priority::Priority;
use crate::scheduler::TaskId;

/// Upper bound on recorded events; logging stops once it is reached.
pub(crate) const MAX_PROFILING_EVENTS: usize = 131_072;

/// Kind of a recorded scheduler event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingEventKind {
	TaskStart { task_id: TaskId, priority: Priority },
	TaskRun { task_id: TaskId, run_id: u64 },
	TaskYield { task_id: TaskId, run_id: u64 },
	TaskComplete { task_id: TaskId },
	TaskError { task_id: TaskId },
	TaskCancel { task_id: TaskId },
	SchedulerSuspend { slice_id: u64 },
	SchedulerResume { slice_id: u64 },
}

/// One timestamped scheduler event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilingEvent {
	pub at: Duration,
	pub kind: ProfilingEventKind,
}

/// In-memory event log. Events are recorded only between `start` and `stop`;
/// tracing events are emitted regardless.
#[derive(Debug, Default)]
pub(crate) struct ProfilingLog {
	events: Option<Vec<ProfilingEvent>>,
	run_id: u64,
	slice_id: u64,
}

impl ProfilingLog {
	pub(crate) fn start(&mut self) {
		self.events = Some(Vec::new());
	}

	pub(crate) fn stop(&mut self) -> Vec<ProfilingEvent> {
		self.events.take().unwrap_or_default()
	}

	pub(crate) fn is_logging(&self) -> bool {
		self.events.is_some()
	}

	fn log(&mut self, at: Duration, kind: ProfilingEventKind) {
		let Some(events) = self.events.as_mut() else {
			return;
		};
		if events.len() >= MAX_PROFILING_EVENTS {
			tracing::warn!(max_events = MAX_PROFILING_EVENTS, "scheduler.profiling.overflow");
			self.events = None;
			return;
		}
		events.push(ProfilingEvent { at, kind });
	}

	pub(crate) fn task_start(&mut self, at: Duration, task_id: TaskId, priority: Priority) {
		tracing::trace!(%task_id, priority = priority.as_str(), "scheduler.task.start");
		self.log(at, ProfilingEventKind::TaskStart { task_id, priority });
	}

	pub(crate) fn task_run(&mut self, at: Duration, task_id: TaskId) {
		self.run_id = self.run_id.wrapping_add(1);
		tracing::trace!(%task_id, run_id = self.run_id, "scheduler.task.run");
		self.log(at, ProfilingEventKind::TaskRun { task_id, run_id: self.run_id });
	}

	pub(crate) fn task_yield(&mut self, at: Duration, task_id: TaskId) {
		tracing::trace!(%task_id, run_id = self.run_id, "scheduler.task.yield");
		self.log(at, ProfilingEventKind::TaskYield { task_id, run_id: self.run_id });
	}

	pub(crate) fn task_complete(&mut self, at: Duration, task_id: TaskId) {
		tracing::trace!(%task_id, "scheduler.task.complete");
		self.log(at, ProfilingEventKind::TaskComplete { task_id });
	}

	pub(crate) fn task_error(&mut self, at: Duration, task_id: TaskId) {
		tracing::debug!(%task_id, "scheduler.task.error");
		self.log(at, ProfilingEventKind::TaskError { task_id });
	}

	pub(crate) fn task_cancel(&mut self, at: Duration, task_id: TaskId) {
		tracing::trace!(%task_id, "scheduler.task.cancel");
		self.log(at, ProfilingEventKind::TaskCancel { task_id });
	}

	pub(crate) fn suspend(&mut self, at: Duration) {
		self.slice_id = self.slice_id.wrapping_add(1);
		self.log(at, ProfilingEventKind::SchedulerSuspend { slice_id: self.slice_id });
	}

	pub(crate) fn resume(&mut self, at: Duration) {
		self.log(at, ProfilingEventKind::SchedulerResume { slice_id: self.slice_id });
	}
}
