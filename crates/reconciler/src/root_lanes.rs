//! Per-root lane bookkeeping.

use std::time::Duration;

use crate::config::ReconcilerConfig;
use crate::lane::{Lane, LaneMap, Lanes};

/// Lane sets tracked for one root.
///
/// `pending` holds every lane with outstanding work. `suspended` and
/// `pinged` are subsets of `pending`: a suspended lane is skipped by
/// [`RootLanes::next_lanes`] until a ping or a new update arrives.
#[derive(Debug, Clone)]
pub struct RootLanes {
	pending: Lanes,
	suspended: Lanes,
	pinged: Lanes,
	expired: Lanes,
	entangled: Lanes,
	entanglements: LaneMap<Lanes>,
	expiration_times: LaneMap<Option<Duration>>,
	next_transition: Lane,
	next_retry: Lane,
}

impl Default for RootLanes {
	fn default() -> Self {
		Self {
			pending: Lanes::empty(),
			suspended: Lanes::empty(),
			pinged: Lanes::empty(),
			expired: Lanes::empty(),
			entangled: Lanes::empty(),
			entanglements: LaneMap::new(Lanes::empty()),
			expiration_times: LaneMap::new(None),
			next_transition: Lanes::first_transition(),
			next_retry: Lanes::first_retry(),
		}
	}
}

impl RootLanes {
	pub fn pending(&self) -> Lanes {
		self.pending
	}

	pub fn suspended(&self) -> Lanes {
		self.suspended
	}

	pub fn pinged(&self) -> Lanes {
		self.pinged
	}

	pub fn expired(&self) -> Lanes {
		self.expired
	}

	pub fn entangled(&self) -> Lanes {
		self.entangled
	}

	/// Records a new update. Any non-idle update unblocks suspended lanes.
	pub fn mark_updated(&mut self, lane: Lane) {
		self.pending |= lane;
		if lane != Lanes::IDLE {
			self.suspended = Lanes::empty();
			self.pinged = Lanes::empty();
		}
	}

	pub fn mark_suspended(&mut self, lanes: Lanes) {
		self.suspended |= lanes;
		self.pinged &= !lanes;
		for lane in lanes.lanes() {
			self.expiration_times.set(lane, None);
		}
	}

	/// Unblocks suspended lanes whose awaited data arrived.
	pub fn mark_pinged(&mut self, lanes: Lanes) {
		self.pinged |= self.suspended & lanes;
	}

	/// Settles the root after a commit. `remaining` is every lane still pending.
	pub fn mark_finished(&mut self, remaining: Lanes) {
		let no_longer_pending = self.pending & !remaining;
		self.pending = remaining;
		self.suspended = Lanes::empty();
		self.pinged = Lanes::empty();
		self.expired &= remaining;
		self.entangled &= remaining;
		for lane in no_longer_pending.lanes() {
			self.entanglements.set(lane, Lanes::empty());
			self.expiration_times.set(lane, None);
		}
	}

	/// Requires `lanes` to render in the same pass from now on.
	pub fn mark_entangled(&mut self, lanes: Lanes) {
		self.entangled |= lanes;
		for lane in self.entangled.lanes() {
			let current = self.entanglements.get(lane);
			if lane.intersects(lanes) || current.intersects(lanes) {
				self.entanglements.set(lane, current | lanes);
			}
		}
	}

	/// Stamps expiration times on fresh pending lanes and moves starved ones into `expired`.
	pub fn mark_starved_as_expired(&mut self, now: Duration, config: &ReconcilerConfig) {
		for lane in self.pending.lanes() {
			match self.expiration_times.get(lane) {
				None => {
					if !self.suspended.intersects(lane) || self.pinged.intersects(lane) {
						self.expiration_times.set(lane, lane.expiration_time(now, config));
					}
				}
				Some(expiration) if expiration <= now => {
					if !self.expired.intersects(lane) {
						tracing::debug!(lane = ?lane, "lanes.expired");
					}
					self.expired |= lane;
				}
				Some(_) => {}
			}
		}
	}

	/// Selects the lanes for the next render.
	///
	/// Expired lanes come first. Otherwise the most urgent non-idle group
	/// that is not suspended wins, then pinged lanes, then idle work. A
	/// selection that is not more urgent than `wip_lanes` keeps the render in
	/// progress. Entangled lanes join the selection.
	pub fn next_lanes(&self, wip_lanes: Lanes) -> Lanes {
		if self.pending.is_empty() {
			return Lanes::empty();
		}

		let mut next = self.expired & self.pending;
		if next.is_empty() {
			let non_idle = self.pending & Lanes::NON_IDLE;
			let pool = if non_idle.is_empty() { self.pending } else { non_idle };
			let unblocked = pool & !self.suspended;
			next = if !unblocked.is_empty() {
				unblocked.highest_priority_group()
			} else {
				(pool & self.pinged).highest_priority_group()
			};
		}
		if next.is_empty() {
			return Lanes::empty();
		}

		if !wip_lanes.is_empty() && wip_lanes != next && !wip_lanes.intersects(self.suspended) && !next.is_higher_priority_than(wip_lanes) {
			return wip_lanes;
		}

		self.entangle(next) & self.pending
	}

	/// Adds every lane entangled with `lanes`.
	pub fn entangle(&self, lanes: Lanes) -> Lanes {
		let mut result = lanes;
		for lane in (self.entangled & lanes).lanes() {
			result |= self.entanglements.get(lane);
		}
		result
	}

	/// Returns true when a render of `lanes` must run without yielding.
	pub fn includes_expired(&self, lanes: Lanes) -> bool {
		self.expired.intersects(lanes)
	}

	/// Expiration time recorded for a single lane. `None` for an empty or
	/// multi-lane set.
	pub fn expiration_time(&self, lane: Lane) -> Option<Duration> {
		if !lane.is_single() {
			return None;
		}
		self.expiration_times.get(lane)
	}

	/// Hands out transition lanes round-robin.
	pub fn claim_next_transition_lane(&mut self) -> Lane {
		let lane = self.next_transition;
		self.next_transition = Lanes::from_bits_retain(lane.bits() << 1);
		if !Lanes::TRANSITIONS.contains(self.next_transition) || self.next_transition.is_empty() {
			self.next_transition = Lanes::first_transition();
		}
		lane
	}

	/// Hands out retry lanes round-robin.
	pub fn claim_next_retry_lane(&mut self) -> Lane {
		let lane = self.next_retry;
		self.next_retry = Lanes::from_bits_retain(lane.bits() << 1);
		if !Lanes::RETRIES.contains(self.next_retry) || self.next_retry.is_empty() {
			self.next_retry = Lanes::first_retry();
		}
		lane
	}

	/// Drops every pending lane without rendering it.
	pub(crate) fn abort_all(&mut self) {
		self.mark_finished(Lanes::empty());
	}
}
