//! Task heap with lazy cancellation.
//!
//! Tasks live in a table keyed by id; the heaps only hold `(sort_index, id)`
//! entries. Cancelling or finishing a task removes it from the table and
//! leaves its heap entry behind, which is discarded the next time it reaches
//! the top. A cancelled task's callback is dropped with its table entry and
//! can never be invoked.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::priority::Priority;
use crate::scheduler::{Callback, TaskId};

pub(crate) struct Task {
	pub(crate) priority: Priority,
	pub(crate) start_time: Duration,
	pub(crate) expiration: Duration,
	/// `None` while the callback is executing.
	pub(crate) callback: Option<Callback>,
	/// Still waiting in the timer heap.
	pub(crate) delayed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
	sort_index: Duration,
	id: TaskId,
}

#[derive(Default)]
pub(crate) struct TaskQueue {
	ready: BinaryHeap<Reverse<Entry>>,
	timers: BinaryHeap<Reverse<Entry>>,
	tasks: FxHashMap<TaskId, Task>,
	delayed: usize,
}

impl TaskQueue {
	/// Inserts a task that is ready to run, ordered by expiration then id.
	pub(crate) fn push_ready(&mut self, id: TaskId, task: Task) {
		self.ready.push(Reverse(Entry {
			sort_index: task.expiration,
			id,
		}));
		self.tasks.insert(id, task);
	}

	/// Inserts a task that becomes ready at its start time.
	pub(crate) fn push_timer(&mut self, id: TaskId, mut task: Task) {
		self.timers.push(Reverse(Entry {
			sort_index: task.start_time,
			id,
		}));
		task.delayed = true;
		self.tasks.insert(id, task);
		self.delayed += 1;
	}

	/// Moves timers whose start time has passed into the ready heap.
	pub(crate) fn advance_timers(&mut self, now: Duration) {
		while let Some(Reverse(entry)) = self.timers.peek().copied() {
			if entry.sort_index > now {
				break;
			}
			self.timers.pop();
			let Some(task) = self.tasks.get_mut(&entry.id) else {
				continue;
			};
			task.delayed = false;
			self.delayed = self.delayed.saturating_sub(1);
			self.ready.push(Reverse(Entry {
				sort_index: task.expiration,
				id: entry.id,
			}));
		}
	}

	/// Returns the most urgent live ready task, discarding dead heap entries.
	pub(crate) fn peek_ready(&mut self) -> Option<(TaskId, &Task)> {
		loop {
			let Reverse(entry) = *self.ready.peek()?;
			match self.tasks.get(&entry.id) {
				None => {
					self.ready.pop();
				}
				// The top task is mid-run; nothing may overtake it.
				Some(task) if task.callback.is_none() => return None,
				Some(_) => break,
			}
		}
		let Reverse(entry) = *self.ready.peek()?;
		self.tasks.get(&entry.id).map(|task| (entry.id, task))
	}

	/// Takes the callback out of a task, marking it as running.
	pub(crate) fn take_callback(&mut self, id: TaskId) -> Option<Callback> {
		self.tasks.get_mut(&id).and_then(|task| task.callback.take())
	}

	/// Reinstalls a continuation. Returns false when the task was cancelled while running.
	pub(crate) fn restore_callback(&mut self, id: TaskId, callback: Callback) -> bool {
		match self.tasks.get_mut(&id) {
			Some(task) => {
				task.callback = Some(callback);
				true
			}
			None => false,
		}
	}

	/// Removes a task. Returns the removed task if it was still live.
	pub(crate) fn remove(&mut self, id: TaskId) -> Option<Task> {
		let task = self.tasks.remove(&id)?;
		if task.delayed {
			self.delayed = self.delayed.saturating_sub(1);
		}
		Some(task)
	}

	pub(crate) fn contains(&self, id: TaskId) -> bool {
		self.tasks.contains_key(&id)
	}

	/// Number of live tasks, ready or delayed.
	pub(crate) fn len(&self) -> usize {
		self.tasks.len()
	}

	/// Number of live tasks that are ready to run.
	pub(crate) fn ready_len(&self) -> usize {
		self.tasks.len().saturating_sub(self.delayed)
	}

	/// Start time of the earliest live timer.
	pub(crate) fn next_timer(&mut self) -> Option<Duration> {
		while let Some(Reverse(entry)) = self.timers.peek().copied() {
			if self.tasks.contains_key(&entry.id) {
				return Some(entry.sort_index);
			}
			self.timers.pop();
		}
		None
	}
}
