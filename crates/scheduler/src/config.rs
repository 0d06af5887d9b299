use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::SchedulerError;

/// Timeout added to a task's start time to compute its expiration.
///
/// Immediate and idle priorities are fixed (already expired, never expires)
/// and are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PriorityTimeouts {
	#[serde(rename = "user_blocking_ms", deserialize_with = "millis")]
	pub user_blocking: Duration,
	#[serde(rename = "normal_ms", deserialize_with = "millis")]
	pub normal: Duration,
	#[serde(rename = "low_ms", deserialize_with = "millis")]
	pub low: Duration,
}

impl Default for PriorityTimeouts {
	fn default() -> Self {
		Self {
			user_blocking: Duration::from_millis(250),
			normal: Duration::from_millis(5_000),
			low: Duration::from_millis(10_000),
		}
	}
}

/// Scheduler configuration.
///
/// Durations are written in milliseconds when loaded from TOML:
///
/// ```toml
/// frame_budget_ms = 5
/// max_slice_ms = 300
///
/// [timeouts]
/// normal_ms = 4000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
	/// Time a slice may run before yielding when the host reports nothing.
	#[serde(rename = "frame_budget_ms", deserialize_with = "millis")]
	pub frame_budget: Duration,
	/// Widened slice while the host reports only continuous input pending.
	#[serde(rename = "continuous_input_budget_ms", deserialize_with = "millis")]
	pub continuous_input_budget: Duration,
	/// Widened slice while the host reports it is not busy.
	#[serde(rename = "max_slice_ms", deserialize_with = "millis")]
	pub max_slice: Duration,
	pub timeouts: PriorityTimeouts,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			frame_budget: Duration::from_millis(5),
			continuous_input_budget: Duration::from_millis(50),
			max_slice: Duration::from_millis(300),
			timeouts: PriorityTimeouts::default(),
		}
	}
}

impl SchedulerConfig {
	/// Parses a configuration from TOML, filling unspecified fields with defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, SchedulerError> {
		Ok(toml::from_str(input)?)
	}
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	u64::deserialize(deserializer).map(Duration::from_millis)
}
