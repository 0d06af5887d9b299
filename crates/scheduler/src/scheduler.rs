//! Cooperative task scheduler.
//!
//! This module provides [`Scheduler`], a single-threaded priority queue of
//! callbacks driven by the host through [`Scheduler::flush`].
//!
//! # Design
//!
//! * Tasks pop by expiration time, ties broken by insertion order.
//! * A callback may return a continuation; the continuation keeps the task's
//!   id, priority and expiration.
//! * State is borrowed only around queue operations, never while a callback
//!   runs, so callbacks may schedule and cancel freely.
//! * Callbacks check [`Scheduler::should_yield`] at safe points and return a
//!   continuation when told to yield.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::{FlushError, SchedulerError, TaskError};
use crate::priority::Priority;
use crate::profiling::{ProfilingEvent, ProfilingLog};
use crate::queue::{Task, TaskQueue};
use crate::remote::{RemoteWaker, WakeHookId, WakeInbox};
use crate::yield_controller::{HostSignals, YieldController};

/// Upper bound on slices executed by [`Scheduler::flush_all`].
const MAX_FLUSH_ALL_SLICES: usize = 10_000;

/// Unique task identifier, increasing in scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Handle returned by [`Scheduler::schedule`], used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
	id: TaskId,
	priority: Priority,
}

impl TaskHandle {
	pub fn id(&self) -> TaskId {
		self.id
	}

	pub fn priority(&self) -> Priority {
		self.priority
	}
}

/// Task callback.
pub type Callback = Box<dyn FnOnce(&TaskRun) -> Result<TaskOutcome, TaskError>>;

/// What a callback wants after it returns.
pub enum TaskOutcome {
	/// The task is finished.
	Done,
	/// Run this continuation later with the same priority and expiration.
	Continue(Callback),
}

impl fmt::Debug for TaskOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Done => f.write_str("Done"),
			Self::Continue(_) => f.write_str("Continue(..)"),
		}
	}
}

/// Context passed to a running callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRun {
	pub id: TaskId,
	pub priority: Priority,
	/// The task's expiration time has passed; it must not yield.
	pub did_timeout: bool,
}

/// Result of one [`Scheduler::flush`] slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
	/// Ready work remains; the host must call `flush` again.
	pub has_more_work: bool,
	/// Start time of the earliest delayed task, if any.
	pub next_timer: Option<Duration>,
	/// Callbacks invoked during this slice.
	pub tasks_run: usize,
}

/// Result of [`Scheduler::flush_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
	/// Slices flushed.
	pub slices: usize,
	/// The slice cap was reached with ready work still queued.
	pub has_more_work: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
	/// Run until the yield controller asks to yield.
	Slice,
	/// Run only tasks whose expiration has passed.
	Expired,
}

struct SchedulerState {
	config: SchedulerConfig,
	queue: TaskQueue,
	next_task_id: u64,
	yielder: YieldController,
	running: Option<(TaskId, Priority)>,
	flushing: bool,
	hooks: FxHashMap<WakeHookId, Box<dyn FnMut()>>,
	next_hook_id: u64,
	profiling: ProfilingLog,
}

/// Cooperative priority scheduler handle.
///
/// Cloning the handle shares the same queue. All methods must be called from
/// the thread that owns the scheduler; other threads use [`RemoteWaker`].
#[derive(Clone)]
pub struct Scheduler {
	state: Rc<RefCell<SchedulerState>>,
	clock: Rc<dyn Clock>,
	inbox: Arc<WakeInbox>,
}

impl fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("Scheduler")
			.field("pending", &state.queue.len())
			.field("running", &state.running)
			.field("clock", &self.clock)
			.finish()
	}
}

/// Clears the flushing flag even when a callback panics.
struct FlushingGuard<'a>(&'a RefCell<SchedulerState>);

impl Drop for FlushingGuard<'_> {
	fn drop(&mut self) {
		if let Ok(mut state) = self.0.try_borrow_mut() {
			state.flushing = false;
			state.running = None;
		}
	}
}

impl Scheduler {
	/// Creates a scheduler with default configuration.
	pub fn new(clock: impl Clock + 'static) -> Self {
		Self::with_config(clock, SchedulerConfig::default())
	}

	/// Creates a scheduler with explicit configuration.
	pub fn with_config(clock: impl Clock + 'static, config: SchedulerConfig) -> Self {
		Self {
			state: Rc::new(RefCell::new(SchedulerState {
				config,
				queue: TaskQueue::default(),
				next_task_id: 1,
				yielder: YieldController::new(&config),
				running: None,
				flushing: false,
				hooks: FxHashMap::default(),
				next_hook_id: 1,
				profiling: ProfilingLog::default(),
			})),
			clock: Rc::new(clock),
			inbox: Arc::new(WakeInbox::default()),
		}
	}

	/// Current time of the scheduler's clock.
	pub fn now(&self) -> Duration {
		self.clock.now()
	}

	pub fn config(&self) -> SchedulerConfig {
		self.state.borrow().config
	}

	/// Schedules a callback that is ready immediately.
	pub fn schedule<F>(&self, priority: Priority, callback: F) -> TaskHandle
	where
		F: FnOnce(&TaskRun) -> Result<TaskOutcome, TaskError> + 'static,
	{
		self.schedule_boxed(priority, Duration::ZERO, Box::new(callback))
	}

	/// Schedules a callback that becomes ready after `delay`.
	pub fn schedule_delayed<F>(&self, priority: Priority, delay: Duration, callback: F) -> TaskHandle
	where
		F: FnOnce(&TaskRun) -> Result<TaskOutcome, TaskError> + 'static,
	{
		self.schedule_boxed(priority, delay, Box::new(callback))
	}

	fn schedule_boxed(&self, priority: Priority, delay: Duration, callback: Callback) -> TaskHandle {
		let now = self.clock.now();
		let mut state = self.state.borrow_mut();
		let id = TaskId(state.next_task_id);
		state.next_task_id += 1;

		let start_time = now.saturating_add(delay);
		let expiration = priority.expiration(start_time, &state.config.timeouts);
		let task = Task {
			priority,
			start_time,
			expiration,
			callback: Some(callback),
			delayed: false,
		};
		if delay.is_zero() {
			state.queue.push_ready(id, task);
		} else {
			state.queue.push_timer(id, task);
		}
		state.profiling.task_start(now, id, priority);

		if let Some((running_id, running_priority)) = state.running
			&& priority < running_priority
		{
			tracing::trace!(%running_id, %id, priority = priority.as_str(), "scheduler.preempt_requested");
			state.yielder.request_yield();
		}

		TaskHandle { id, priority }
	}

	/// Cancels a pending task. Returns false if it already finished or was cancelled.
	///
	/// Cancelling the task that is currently running drops its continuation.
	pub fn cancel(&self, handle: TaskHandle) -> bool {
		let now = self.clock.now();
		let mut state = self.state.borrow_mut();
		if state.queue.remove(handle.id).is_none() {
			return false;
		}
		state.profiling.task_cancel(now, handle.id);
		true
	}

	/// Returns true while the task is queued or running.
	pub fn is_pending(&self, handle: TaskHandle) -> bool {
		self.state.borrow().queue.contains(handle.id)
	}

	/// Number of live tasks, including delayed ones.
	pub fn pending_count(&self) -> usize {
		self.state.borrow().queue.len()
	}

	/// Returns true when a flush would do something right now.
	pub fn has_pending_work(&self) -> bool {
		self.state.borrow().queue.ready_len() > 0 || !self.inbox.is_empty()
	}

	/// Priority of the task currently executing.
	pub fn current_priority(&self) -> Option<Priority> {
		self.state.borrow().running.map(|(_, priority)| priority)
	}

	/// Returns true when the running callback should return control to the host.
	pub fn should_yield(&self) -> bool {
		let now = self.clock.now();
		self.state.borrow().yielder.should_yield(now)
	}

	/// Asks the running callback to yield at its next safe point.
	pub fn request_yield(&self) {
		self.state.borrow_mut().yielder.request_yield();
	}

	/// Reports host busy-state. `None` means the host cannot observe its input queue.
	pub fn set_host_signals(&self, signals: Option<HostSignals>) {
		self.state.borrow_mut().yielder.set_host_signals(signals);
	}

	/// Reports that the host has nothing pending, widening slices up to `max_slice`.
	pub fn report_host_idle(&self) {
		self.set_host_signals(Some(HostSignals::default()));
	}

	/// Derives the frame budget from a target frame rate; zero restores the configured budget.
	pub fn force_frame_rate(&self, fps: u32) -> Result<(), SchedulerError> {
		let mut state = self.state.borrow_mut();
		let default_budget = state.config.frame_budget;
		state.yielder.force_frame_rate(fps, default_budget)
	}

	/// Registers a hook that runs on the cooperative thread whenever the
	/// returned waker is woken.
	pub fn register_wake_hook<F>(&self, hook: F) -> RemoteWaker
	where
		F: FnMut() + 'static,
	{
		let mut state = self.state.borrow_mut();
		let id = WakeHookId(state.next_hook_id);
		state.next_hook_id += 1;
		state.hooks.insert(id, Box::new(hook));
		RemoteWaker::new(id, Arc::clone(&self.inbox))
	}

	pub fn unregister_wake_hook(&self, id: WakeHookId) {
		self.state.borrow_mut().hooks.remove(&id);
	}

	/// Starts recording profiling events, discarding any previous log.
	pub fn start_profiling(&self) {
		self.state.borrow_mut().profiling.start();
	}

	/// Stops recording and returns the recorded events.
	pub fn stop_profiling(&self) -> Vec<ProfilingEvent> {
		self.state.borrow_mut().profiling.stop()
	}

	pub fn is_profiling(&self) -> bool {
		self.state.borrow().profiling.is_logging()
	}

	/// Runs tasks for one host slice.
	///
	/// Expired tasks always run; other tasks run until
	/// [`Scheduler::should_yield`] reports the slice is spent.
	pub fn flush(&self) -> Result<FlushOutcome, FlushError> {
		self.flush_with(FlushMode::Slice)
	}

	/// Runs only tasks whose expiration time has passed.
	pub fn flush_expired(&self) -> Result<FlushOutcome, FlushError> {
		self.flush_with(FlushMode::Expired)
	}

	/// Flushes slices until no ready work remains or the slice cap is hit.
	pub fn flush_all(&self) -> Result<DrainOutcome, FlushError> {
		let mut slices = 0;
		loop {
			let outcome = self.flush()?;
			slices += 1;
			if !outcome.has_more_work {
				return Ok(DrainOutcome {
					slices,
					has_more_work: false,
				});
			}
			if slices >= MAX_FLUSH_ALL_SLICES {
				tracing::warn!(slices, pending = self.pending_count(), "scheduler.flush_all.slice_cap");
				return Ok(DrainOutcome {
					slices,
					has_more_work: true,
				});
			}
		}
	}

	fn flush_with(&self, mode: FlushMode) -> Result<FlushOutcome, FlushError> {
		{
			let mut state = self.state.borrow_mut();
			if state.flushing {
				tracing::warn!("scheduler.flush.reentrant");
				return Ok(FlushOutcome {
					has_more_work: true,
					..FlushOutcome::default()
				});
			}
			state.flushing = true;
			let now = self.clock.now();
			state.yielder.begin_slice(now);
			state.profiling.resume(now);
		}
		let _guard = FlushingGuard(&self.state);

		let mut tasks_run = 0;
		loop {
			self.run_wake_hooks();

			let now = self.clock.now();
			let (id, priority, expiration, callback) = {
				let mut state = self.state.borrow_mut();
				let state = &mut *state;
				state.queue.advance_timers(now);
				let Some((id, task)) = state.queue.peek_ready() else {
					break;
				};
				let (priority, expiration) = (task.priority, task.expiration);
				let expired = expiration <= now;
				let stop = match mode {
					FlushMode::Slice => !expired && state.yielder.should_yield(now),
					FlushMode::Expired => !expired,
				};
				if stop {
					break;
				}
				let Some(callback) = state.queue.take_callback(id) else {
					break;
				};
				state.running = Some((id, priority));
				state.profiling.task_run(now, id);
				(id, priority, expiration, callback)
			};

			let run = TaskRun {
				id,
				priority,
				did_timeout: expiration <= now,
			};
			let result = callback(&run);
			tasks_run += 1;

			let now = self.clock.now();
			let mut state = self.state.borrow_mut();
			state.running = None;
			state.yielder.clear_yield_request();
			match result {
				Ok(TaskOutcome::Continue(next)) => {
					if state.queue.restore_callback(id, next) {
						state.profiling.task_yield(now, id);
					}
				}
				Ok(TaskOutcome::Done) => {
					state.queue.remove(id);
					state.profiling.task_complete(now, id);
				}
				Err(source) => {
					state.queue.remove(id);
					state.profiling.task_error(now, id);
					tracing::debug!(%id, error = %source, "scheduler.flush.task_failed");
					return Err(FlushError { task_id: id, source });
				}
			}
		}

		let now = self.clock.now();
		let mut state = self.state.borrow_mut();
		state.queue.advance_timers(now);
		let outcome = FlushOutcome {
			has_more_work: state.queue.ready_len() > 0 || !self.inbox.is_empty(),
			next_timer: state.queue.next_timer(),
			tasks_run,
		};
		state.profiling.suspend(now);
		Ok(outcome)
	}

	fn run_wake_hooks(&self) {
		if self.inbox.is_empty() {
			return;
		}
		for id in self.inbox.drain() {
			let hook = self.state.borrow_mut().hooks.remove(&id);
			let Some(mut hook) = hook else {
				continue;
			};
			tracing::trace!(hook = id.0, "scheduler.wake_hook");
			hook();
			self.state.borrow_mut().hooks.entry(id).or_insert(hook);
		}
	}
}
