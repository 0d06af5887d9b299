use std::time::Duration;

use serde::Deserialize;

use crate::config::PriorityTimeouts;

/// Scheduler priority level. Declaration order is urgency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	/// Already expired on arrival; runs before anything that is not yet late.
	Immediate,
	/// Direct user interaction (clicks, key presses).
	UserBlocking,
	/// Default priority for ordinary updates.
	Normal,
	/// Work that may wait several seconds.
	Low,
	/// Never expires; runs only when nothing else is pending.
	Idle,
}

impl Priority {
	/// All priorities, most urgent first.
	pub const ALL: [Self; 5] = [Self::Immediate, Self::UserBlocking, Self::Normal, Self::Low, Self::Idle];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Immediate => "immediate",
			Self::UserBlocking => "user_blocking",
			Self::Normal => "normal",
			Self::Low => "low",
			Self::Idle => "idle",
		}
	}

	/// Computes the expiration time of a task that becomes ready at `start`.
	///
	/// Immediate tasks expire one millisecond before they start; idle tasks
	/// expire at [`Duration::MAX`] and therefore never time out.
	pub fn expiration(self, start: Duration, timeouts: &PriorityTimeouts) -> Duration {
		match self {
			Self::Immediate => start.saturating_sub(Duration::from_millis(1)),
			Self::UserBlocking => start.saturating_add(timeouts.user_blocking),
			Self::Normal => start.saturating_add(timeouts.normal),
			Self::Low => start.saturating_add(timeouts.low),
			Self::Idle => Duration::MAX,
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(Priority::UserBlocking, 250)]
	#[case(Priority::Normal, 5_000)]
	#[case(Priority::Low, 10_000)]
	fn test_expiration_adds_default_timeout(#[case] priority: Priority, #[case] millis: u64) {
		let start = Duration::from_millis(100);
		let expiration = priority.expiration(start, &PriorityTimeouts::default());
		assert_eq!(expiration, start + Duration::from_millis(millis));
	}

	#[test]
	fn test_immediate_is_already_expired() {
		let start = Duration::from_millis(10);
		assert!(Priority::Immediate.expiration(start, &PriorityTimeouts::default()) < start);
	}

	#[test]
	fn test_idle_never_expires() {
		assert_eq!(Priority::Idle.expiration(Duration::ZERO, &PriorityTimeouts::default()), Duration::MAX);
	}

	#[test]
	fn test_declaration_order_is_urgency_order() {
		let mut sorted = Priority::ALL;
		sorted.sort();
		assert_eq!(sorted, Priority::ALL);
	}
}
