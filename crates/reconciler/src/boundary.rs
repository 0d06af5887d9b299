//! Boundary retry registry and explicit hydration targets.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use weft_scheduler::RemoteWaker;

use crate::lane::{Lane, Lanes};
use crate::resource::WakeableId;
use crate::unit::Identity;

/// Message delivered from a resolved awaitable back to its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ping {
	/// The whole root suspended on this resource at `lanes`.
	Root { resource: WakeableId, lanes: Lanes },
	/// A boundary showing its fallback can retry its content.
	Retry { boundary: Identity, resource: WakeableId },
}

/// Thread-safe sender of pings into a root's inbox.
///
/// Listeners may fire on any thread. They only queue the ping and wake the
/// root's hook; the ping is applied on the cooperative thread during the
/// next flush.
#[derive(Debug, Clone)]
pub(crate) struct Pinger {
	inbox: Arc<Mutex<Vec<Ping>>>,
	waker: RemoteWaker,
}

impl Pinger {
	pub(crate) fn new(waker: RemoteWaker) -> Self {
		Self {
			inbox: Arc::new(Mutex::new(Vec::new())),
			waker,
		}
	}

	pub(crate) fn listener(&self, ping: Ping) -> Box<dyn FnOnce() + Send> {
		let inbox = Arc::clone(&self.inbox);
		let waker = self.waker.clone();
		Box::new(move || {
			inbox.lock().push(ping);
			waker.wake();
		})
	}

	pub(crate) fn drain(&self) -> Vec<Ping> {
		std::mem::take(&mut *self.inbox.lock())
	}
}

struct Registration {
	lane: Lane,
	resources: FxHashSet<WakeableId>,
}

/// Outstanding retry subscriptions, one per (boundary, resource) pair.
#[derive(Default)]
pub(crate) struct RetryRegistry {
	entries: FxHashMap<Identity, Registration>,
}

impl RetryRegistry {
	/// Records a subscription. Returns false when the pair is already subscribed.
	///
	/// All resources of a boundary share its single retry lane.
	pub(crate) fn register(&mut self, boundary: Identity, lane: Lane, resource: WakeableId) -> bool {
		let entry = self.entries.entry(boundary).or_insert_with(|| Registration {
			lane,
			resources: FxHashSet::default(),
		});
		entry.lane = lane;
		entry.resources.insert(resource)
	}

	/// Consumes one subscription, returning the lane to retry at.
	pub(crate) fn resolve(&mut self, boundary: Identity, resource: WakeableId) -> Option<Lane> {
		let entry = self.entries.get_mut(&boundary)?;
		if !entry.resources.remove(&resource) {
			return None;
		}
		let lane = entry.lane;
		if entry.resources.is_empty() {
			self.entries.remove(&boundary);
		}
		Some(lane)
	}

	/// Drops every subscription of a deleted boundary.
	pub(crate) fn forget(&mut self, boundary: Identity) {
		self.entries.remove(&boundary);
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.values().map(|entry| entry.resources.len()).sum()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HydrationTarget {
	pub(crate) boundary: Identity,
	pub(crate) lane: Lane,
	pub(crate) boosted: bool,
}

/// Boundaries the host explicitly asked to hydrate, most urgent first.
///
/// Among equal lanes the most recent request goes first. Only the front
/// target is boosted; the next one is boosted once the front has committed
/// its content.
#[derive(Debug, Default)]
pub(crate) struct HydrationQueue {
	targets: VecDeque<HydrationTarget>,
}

impl HydrationQueue {
	/// Queues a target. Returns true when it became the front.
	pub(crate) fn push(&mut self, boundary: Identity, lane: Lane) -> bool {
		self.targets.retain(|target| target.boundary != boundary);
		let position = self
			.targets
			.iter()
			.position(|target| !target.lane.is_higher_priority_than(lane))
			.unwrap_or(self.targets.len());
		self.targets.insert(position, HydrationTarget { boundary, lane, boosted: false });
		position == 0
	}

	pub(crate) fn front(&self) -> Option<HydrationTarget> {
		self.targets.front().copied()
	}

	pub(crate) fn mark_front_boosted(&mut self) {
		if let Some(front) = self.targets.front_mut() {
			front.boosted = true;
		}
	}

	pub(crate) fn pop_front(&mut self) -> Option<HydrationTarget> {
		self.targets.pop_front()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.targets.is_empty()
	}
}
