use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Reconciler configuration.
///
/// Durations are written in milliseconds when loaded from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
	/// Starvation timeout for sync and continuous-input lanes.
	#[serde(rename = "sync_timeout_ms", deserialize_with = "millis")]
	pub sync_timeout: Duration,
	/// Starvation timeout for default lanes.
	#[serde(rename = "default_timeout_ms", deserialize_with = "millis")]
	pub default_timeout: Duration,
	/// Starvation timeout for transition lanes.
	#[serde(rename = "transition_timeout_ms", deserialize_with = "millis")]
	pub transition_timeout: Duration,
	/// Consecutive sync commits triggered from commit callbacks before the root gives up.
	pub nested_update_limit: u32,
	/// When false, every render runs to completion without yielding.
	pub time_slicing: bool,
}

impl Default for ReconcilerConfig {
	fn default() -> Self {
		Self {
			sync_timeout: Duration::from_millis(250),
			default_timeout: Duration::from_millis(5_000),
			transition_timeout: Duration::from_millis(5_000),
			nested_update_limit: 50,
			time_slicing: true,
		}
	}
}

impl ReconcilerConfig {
	/// Parses a configuration from TOML, filling unspecified fields with defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		if config.nested_update_limit == 0 {
			return Err(ConfigError::InvalidValue {
				field: "nested_update_limit",
				reason: "must be at least 1",
			});
		}
		Ok(config)
	}
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	u64::deserialize(deserializer).map(Duration::from_millis)
}
