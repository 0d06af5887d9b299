//! Per-commit render timing.

use std::time::Duration;

use crate::lane::Lanes;

/// Timing and work counters of one committed render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProfile {
	/// Lanes the committed render processed.
	pub lanes: Lanes,
	/// When the render that produced this commit started.
	pub render_started: Duration,
	/// When the commit finished applying mutations.
	pub commit_time: Duration,
	/// Units begun during the render, including re-begun boundaries.
	pub units_performed: u32,
	/// Times the render yielded back to the scheduler.
	pub yields: u32,
	/// Renders discarded before this one since the previous commit.
	pub restarts: u32,
}

/// Counters accumulated while a render is in flight.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderTimer {
	started: Duration,
	pub(crate) units: u32,
	pub(crate) yields: u32,
	restarts: u32,
}

impl RenderTimer {
	pub(crate) fn start(now: Duration, restarts: u32) -> Self {
		Self {
			started: now,
			units: 0,
			yields: 0,
			restarts,
		}
	}

	pub(crate) fn finish(self, lanes: Lanes, commit_time: Duration) -> RenderProfile {
		RenderProfile {
			lanes,
			render_started: self.started,
			commit_time,
			units_performed: self.units,
			yields: self.yields,
			restarts: self.restarts,
		}
	}
}
