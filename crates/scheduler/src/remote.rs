use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Identifier of a wake hook registered on a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeHookId(pub(crate) u64);

/// Shared inbox of woken hooks, drained on the cooperative thread.
#[derive(Debug, Default)]
pub(crate) struct WakeInbox {
	pending: Mutex<VecDeque<WakeHookId>>,
}

impl WakeInbox {
	pub(crate) fn drain(&self) -> Vec<WakeHookId> {
		self.pending.lock().drain(..).collect()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.pending.lock().is_empty()
	}
}

/// Thread-safe handle that asks the scheduler to run one wake hook.
///
/// Host callbacks that fire on other threads (timers, I/O completions) must
/// not touch cooperative state directly. They call [`RemoteWaker::wake`]
/// instead; the hook runs at the start of the next
/// [`crate::Scheduler::flush`]. Repeated wakes before that flush coalesce.
#[derive(Debug, Clone)]
pub struct RemoteWaker {
	id: WakeHookId,
	inbox: Arc<WakeInbox>,
}

impl RemoteWaker {
	pub(crate) fn new(id: WakeHookId, inbox: Arc<WakeInbox>) -> Self {
		Self { id, inbox }
	}

	pub fn id(&self) -> WakeHookId {
		self.id
	}

	/// Marks the hook pending.
	pub fn wake(&self) {
		let mut pending = self.inbox.pending.lock();
		if !pending.contains(&self.id) {
			pending.push_back(self.id);
		}
	}
}
