use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source measured from an arbitrary origin.
///
/// Every timestamp the scheduler and reconciler handle (start times,
/// expirations, lane deadlines) is a [`Duration`] since this origin.
pub trait Clock: fmt::Debug {
	/// Returns the current time since the clock's origin.
	fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
	origin: Instant,
}

impl SystemClock {
	/// Creates a clock whose origin is the moment of construction.
	pub fn new() -> Self {
		Self { origin: Instant::now() }
	}
}

impl Default for SystemClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for SystemClock {
	fn now(&self) -> Duration {
		self.origin.elapsed()
	}
}

#[derive(Debug, Default)]
struct ManualInner {
	now: Cell<Duration>,
	tick: Cell<Duration>,
}

/// Deterministic clock for tests and simulated hosts.
///
/// Clones share the same time. With a non-zero tick, every read returns the
/// current time and then advances it by the tick, which lets a test make the
/// work loop exhaust its frame budget after a known number of units.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	inner: Rc<ManualInner>,
}

impl ManualClock {
	/// Creates a clock frozen at zero.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a clock that advances by `tick` on every read.
	pub fn with_tick(tick: Duration) -> Self {
		let clock = Self::default();
		clock.inner.tick.set(tick);
		clock
	}

	/// Advances the clock.
	pub fn advance(&self, by: Duration) {
		self.inner.now.set(self.inner.now.get().saturating_add(by));
	}

	/// Sets the auto-advance tick. Zero freezes the clock between explicit advances.
	pub fn set_tick(&self, tick: Duration) {
		self.inner.tick.set(tick);
	}

	/// Returns the current time without advancing.
	pub fn peek(&self) -> Duration {
		self.inner.now.get()
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Duration {
		let now = self.inner.now.get();
		self.inner.now.set(now.saturating_add(self.inner.tick.get()));
		now
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock_shares_time_between_clones() {
		let clock = ManualClock::new();
		let other = clock.clone();
		clock.advance(Duration::from_millis(7));
		assert_eq!(other.now(), Duration::from_millis(7));
	}

	#[test]
	fn test_manual_clock_tick_advances_after_read() {
		let clock = ManualClock::with_tick(Duration::from_millis(2));
		assert_eq!(clock.now(), Duration::ZERO);
		assert_eq!(clock.now(), Duration::from_millis(2));
		assert_eq!(clock.peek(), Duration::from_millis(4));
	}
}
