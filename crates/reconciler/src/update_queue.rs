//! Root update queue.
//!
//! Updates are kept in arrival order. A render applies only the updates whose
//! lane it is processing; the first skipped update freezes the base state and
//! every later update is kept in the base queue so a later render replays
//! them in arrival order. Whatever subset renders first, the final state
//! equals applying every update in order.

use std::fmt;
use std::rc::Rc;

use crate::element::Element;
use crate::lane::{Lane, Lanes};

/// Callback run after the commit that applied its update.
pub type CommitCallback = Rc<dyn Fn()>;

/// How an update changes the root element.
#[derive(Clone)]
pub enum Payload {
	/// Replace the root element.
	Replace(Element),
	/// Derive the next root element from the previous one.
	Reduce(Rc<dyn Fn(Option<&Element>) -> Element>),
	/// Unmount everything.
	Clear,
}

impl Payload {
	pub fn reduce<F>(reducer: F) -> Self
	where
		F: Fn(Option<&Element>) -> Element + 'static,
	{
		Self::Reduce(Rc::new(reducer))
	}

	fn apply(&self, state: Option<Element>) -> Option<Element> {
		match self {
			Self::Replace(element) => Some(element.clone()),
			Self::Reduce(reducer) => Some(reducer(state.as_ref())),
			Self::Clear => None,
		}
	}
}

impl fmt::Debug for Payload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Replace(element) => f.debug_tuple("Replace").field(element).finish(),
			Self::Reduce(_) => f.write_str("Reduce(..)"),
			Self::Clear => f.write_str("Clear"),
		}
	}
}

#[derive(Clone)]
struct QueuedUpdate {
	/// Empty once rebased: always applied.
	lane: Lanes,
	payload: Payload,
	callback: Option<CommitCallback>,
}

/// Outcome of processing the queue for one render.
pub(crate) struct Processed {
	pub(crate) state: Option<Element>,
	pub(crate) skipped: Lanes,
	pub(crate) callbacks: Vec<CommitCallback>,
	base_state: Option<Element>,
	base: Vec<QueuedUpdate>,
	consumed: usize,
}

#[derive(Default)]
pub(crate) struct UpdateQueue {
	base_state: Option<Element>,
	base: Vec<QueuedUpdate>,
	pending: Vec<QueuedUpdate>,
}

impl UpdateQueue {
	pub(crate) fn push(&mut self, lane: Lane, payload: Payload, callback: Option<CommitCallback>) {
		self.pending.push(QueuedUpdate { lane, payload, callback });
	}

	/// Computes the state for a render of `lanes` without mutating the queue.
	pub(crate) fn process(&self, lanes: Lanes) -> Processed {
		let mut state = self.base_state.clone();
		let mut frozen: Option<Option<Element>> = None;
		let mut base = Vec::new();
		let mut skipped = Lanes::empty();
		let mut callbacks = Vec::new();

		for update in self.base.iter().chain(&self.pending) {
			if !lanes.contains(update.lane) {
				if frozen.is_none() {
					frozen = Some(state.clone());
				}
				base.push(update.clone());
				skipped |= update.lane;
				continue;
			}
			if frozen.is_some() {
				base.push(QueuedUpdate {
					lane: Lanes::empty(),
					payload: update.payload.clone(),
					callback: None,
				});
			}
			state = update.payload.apply(state);
			if let Some(callback) = &update.callback {
				callbacks.push(Rc::clone(callback));
			}
		}

		Processed {
			base_state: frozen.unwrap_or_else(|| state.clone()),
			state,
			skipped,
			callbacks,
			base,
			consumed: self.pending.len(),
		}
	}

	/// Adopts a committed render's result. Updates that arrived after the
	/// render started stay pending.
	pub(crate) fn commit(&mut self, processed: Processed) {
		self.base_state = processed.base_state;
		self.base = processed.base;
		let consumed = processed.consumed.min(self.pending.len());
		self.pending.drain(..consumed);
	}

	/// Lanes of updates not yet covered by `processed`.
	pub(crate) fn lanes_after(&self, processed: &Processed) -> Lanes {
		self.pending
			.iter()
			.skip(processed.consumed)
			.fold(processed.skipped, |lanes, update| lanes | update.lane)
	}

	/// Lanes of every queued update.
	pub(crate) fn lanes(&self) -> Lanes {
		self.base.iter().chain(&self.pending).fold(Lanes::empty(), |lanes, update| lanes | update.lane)
	}

	/// Drops every queued update and rebases onto the committed element.
	pub(crate) fn clear(&mut self, committed: Option<Element>) {
		self.base_state = committed;
		self.base.clear();
		self.pending.clear();
	}

	pub(crate) fn len(&self) -> usize {
		self.base.len() + self.pending.len()
	}
}
