//! Awaitable values that components may suspend on.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Identifier of an awaitable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WakeableId(u64);

impl WakeableId {
	/// Allocates a process-unique id.
	pub fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for WakeableId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "wakeable#{}", self.0)
	}
}

/// Something a render can wait on.
///
/// `then` may be called from the render thread and the callback may fire on
/// any thread. A callback registered after resolution fires immediately.
pub trait Wakeable: Send + Sync {
	fn id(&self) -> WakeableId;

	/// Subscribes a one-shot callback fired on resolution.
	fn then(&self, callback: Box<dyn FnOnce() + Send>);
}

enum Slot<T> {
	Pending(Vec<Box<dyn FnOnce() + Send>>),
	Ready(T),
}

struct ResourceCell<T> {
	id: WakeableId,
	slot: Mutex<Slot<T>>,
}

impl<T: Send> Wakeable for ResourceCell<T> {
	fn id(&self) -> WakeableId {
		self.id
	}

	fn then(&self, callback: Box<dyn FnOnce() + Send>) {
		let mut slot = self.slot.lock();
		match &mut *slot {
			Slot::Pending(waiters) => waiters.push(callback),
			Slot::Ready(_) => {
				drop(slot);
				callback();
			}
		}
	}
}

/// One-shot value cell that components read with
/// [`RenderContext::read`](crate::RenderContext::read).
///
/// Clones share the same cell; resolving from any thread wakes every
/// subscriber once.
pub struct Resource<T> {
	cell: Arc<ResourceCell<T>>,
}

impl<T> Clone for Resource<T> {
	fn clone(&self) -> Self {
		Self {
			cell: Arc::clone(&self.cell),
		}
	}
}

impl<T> fmt::Debug for Resource<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let ready = matches!(&*self.cell.slot.lock(), Slot::Ready(_));
		f.debug_struct("Resource").field("id", &self.cell.id).field("ready", &ready).finish()
	}
}

impl<T: Clone + Send + 'static> Resource<T> {
	/// Creates an unresolved resource.
	pub fn pending() -> Self {
		Self {
			cell: Arc::new(ResourceCell {
				id: WakeableId::next(),
				slot: Mutex::new(Slot::Pending(Vec::new())),
			}),
		}
	}

	/// Creates an already resolved resource.
	pub fn ready(value: T) -> Self {
		Self {
			cell: Arc::new(ResourceCell {
				id: WakeableId::next(),
				slot: Mutex::new(Slot::Ready(value)),
			}),
		}
	}

	pub fn id(&self) -> WakeableId {
		self.cell.id
	}

	/// Stores the value and fires subscribers. Returns false if already resolved.
	pub fn resolve(&self, value: T) -> bool {
		let waiters = {
			let mut slot = self.cell.slot.lock();
			match std::mem::replace(&mut *slot, Slot::Ready(value)) {
				Slot::Pending(waiters) => waiters,
				Slot::Ready(previous) => {
					*slot = Slot::Ready(previous);
					return false;
				}
			}
		};
		tracing::trace!(resource = %self.cell.id, waiters = waiters.len(), "resource.resolve");
		for waiter in waiters {
			waiter();
		}
		true
	}

	/// Current value, if resolved.
	pub fn get(&self) -> Option<T> {
		match &*self.cell.slot.lock() {
			Slot::Ready(value) => Some(value.clone()),
			Slot::Pending(_) => None,
		}
	}

	pub fn is_ready(&self) -> bool {
		matches!(&*self.cell.slot.lock(), Slot::Ready(_))
	}

	/// Type-erased handle used to suspend on this resource.
	pub fn as_wakeable(&self) -> Arc<dyn Wakeable> {
		self.cell.clone()
	}
}
