//! Priority lanes.
//!
//! A lane is one bit of a 31-bit set. Lower bits are more urgent. Updates
//! carry exactly one lane; renders process a set of lanes at once.

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use weft_scheduler::Priority;

use crate::config::ReconcilerConfig;

/// Number of lanes in a [`Lanes`] set.
pub const TOTAL_LANES: usize = 31;

bitflags! {
	/// Set of priority lanes.
	#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Lanes: u32 {
		const SYNC = 1 << 0;
		const INPUT_CONTINUOUS_HYDRATION = 1 << 1;
		const INPUT_CONTINUOUS = 1 << 2;
		const DEFAULT_HYDRATION = 1 << 3;
		const DEFAULT = 1 << 4;
		const TRANSITION_HYDRATION = 1 << 5;
		/// Sixteen transition lanes, bits 6 through 21.
		const TRANSITIONS = 0x003F_FFC0;
		/// Five retry lanes, bits 22 through 26.
		const RETRIES = 0x07C0_0000;
		const SELECTIVE_HYDRATION = 1 << 27;
		const IDLE_HYDRATION = 1 << 28;
		const IDLE = 1 << 29;
		const OFFSCREEN = 1 << 30;

		const NON_IDLE = 0x0FFF_FFFF;
	}
}

/// A single lane. Always exactly one bit of [`Lanes`].
pub type Lane = Lanes;

const FIRST_TRANSITION: Lanes = Lanes::from_bits_retain(1 << 6);
const FIRST_RETRY: Lanes = Lanes::from_bits_retain(1 << 22);

impl Lanes {
	/// Returns the most urgent lane in the set, or an empty set.
	pub const fn highest_priority_lane(self) -> Lane {
		Self::from_bits_retain(self.bits() & self.bits().wrapping_neg())
	}

	/// Bit index of a single lane.
	pub const fn index(self) -> usize {
		self.bits().trailing_zeros() as usize
	}

	/// Returns true when `self` is exactly one lane.
	pub const fn is_single(self) -> bool {
		self.bits().is_power_of_two()
	}

	/// Iterates the individual lanes of the set, most urgent first.
	pub fn lanes(self) -> impl Iterator<Item = Lane> {
		let mut remaining = self.bits();
		std::iter::from_fn(move || {
			if remaining == 0 {
				return None;
			}
			let lane = remaining & remaining.wrapping_neg();
			remaining &= !lane;
			Some(Self::from_bits_retain(lane))
		})
	}

	/// Most urgent group of lanes that render together.
	///
	/// Transition lanes batch with each other, as do retry lanes; every other
	/// lane renders alone.
	pub fn highest_priority_group(self) -> Lanes {
		let lane = self.highest_priority_lane();
		if Self::TRANSITIONS.contains(lane) && !lane.is_empty() {
			self & Self::TRANSITIONS
		} else if Self::RETRIES.contains(lane) && !lane.is_empty() {
			self & Self::RETRIES
		} else {
			lane
		}
	}

	/// Returns true when `self` is more urgent than `other`.
	///
	/// Compares the highest lanes of each set. An empty set is never more urgent.
	pub fn is_higher_priority_than(self, other: Lanes) -> bool {
		let ours = self.highest_priority_lane();
		let theirs = other.highest_priority_lane();
		!ours.is_empty() && (theirs.is_empty() || ours.bits() < theirs.bits())
	}

	/// Returns true when rendering these lanes must not yield.
	pub fn is_blocking(self) -> bool {
		self.intersects(Self::SYNC)
	}

	pub fn includes_non_idle(self) -> bool {
		self.intersects(Self::NON_IDLE)
	}

	pub fn is_retry_only(self) -> bool {
		!self.is_empty() && Self::RETRIES.contains(self)
	}

	/// Scheduler priority used to run a render of these lanes.
	pub fn to_priority(self) -> Priority {
		let lane = self.highest_priority_lane();
		if lane.is_empty() || !lane.includes_non_idle() {
			Priority::Idle
		} else if lane == Self::SYNC {
			Priority::Immediate
		} else if lane.intersects(Self::INPUT_CONTINUOUS | Self::INPUT_CONTINUOUS_HYDRATION) {
			Priority::UserBlocking
		} else {
			Priority::Normal
		}
	}

	/// Time after which a pending lane counts as starved, or `None` when it never expires.
	pub fn expiration_time(self, now: Duration, config: &ReconcilerConfig) -> Option<Duration> {
		let lane = self.highest_priority_lane();
		if lane.intersects(Self::SYNC | Self::INPUT_CONTINUOUS_HYDRATION | Self::INPUT_CONTINUOUS) {
			Some(now.saturating_add(config.sync_timeout))
		} else if lane.intersects(Self::DEFAULT_HYDRATION | Self::DEFAULT) {
			Some(now.saturating_add(config.default_timeout))
		} else if lane.intersects(Self::TRANSITION_HYDRATION | Self::TRANSITIONS) {
			Some(now.saturating_add(config.transition_timeout))
		} else {
			None
		}
	}

	/// Lane used for an update requested at a scheduler priority.
	///
	/// Low priority maps onto the transition range; callers that want a
	/// distinct transition lane use [`crate::Root::claim_transition_lane`].
	pub fn for_priority(priority: Priority) -> Lane {
		match priority {
			Priority::Immediate => Self::SYNC,
			Priority::UserBlocking => Self::INPUT_CONTINUOUS,
			Priority::Normal => Self::DEFAULT,
			Priority::Low => FIRST_TRANSITION,
			Priority::Idle => Self::IDLE,
		}
	}

	pub(crate) const fn first_transition() -> Lane {
		FIRST_TRANSITION
	}

	pub(crate) const fn first_retry() -> Lane {
		FIRST_RETRY
	}
}

impl fmt::Debug for Lanes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Lanes({:#033b})", self.bits())
	}
}

/// One value per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LaneMap<T: Copy> {
	slots: [T; TOTAL_LANES],
}

impl<T: Copy> LaneMap<T> {
	pub(crate) fn new(value: T) -> Self {
		Self { slots: [value; TOTAL_LANES] }
	}

	/// `lane` must be a single lane.
	pub(crate) fn get(&self, lane: Lane) -> T {
		debug_assert!(lane.is_single(), "lane map indexed by {lane:?}");
		self.slots[lane.index()]
	}

	/// `lane` must be a single lane.
	pub(crate) fn set(&mut self, lane: Lane, value: T) {
		debug_assert!(lane.is_single(), "lane map indexed by {lane:?}");
		self.slots[lane.index()] = value;
	}
}
