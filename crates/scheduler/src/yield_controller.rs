use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

/// Busy-state reported by a host that can observe its own input queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSignals {
	/// Discrete input (click, key press) is waiting to be handled.
	pub input_pending: bool,
	/// Continuous input (pointer move, scroll) is waiting to be handled.
	pub continuous_input_pending: bool,
	/// The host wants to paint as soon as possible.
	pub needs_paint: bool,
}

/// Decides when the running task must return control to the host.
#[derive(Debug)]
pub(crate) struct YieldController {
	slice_start: Duration,
	frame_budget: Duration,
	continuous_input_budget: Duration,
	max_slice: Duration,
	/// `None` when the host does not report busy-state.
	signals: Option<HostSignals>,
	yield_requested: bool,
}

impl YieldController {
	pub(crate) fn new(config: &SchedulerConfig) -> Self {
		Self {
			slice_start: Duration::ZERO,
			frame_budget: config.frame_budget,
			continuous_input_budget: config.continuous_input_budget,
			max_slice: config.max_slice,
			signals: None,
			yield_requested: false,
		}
	}

	pub(crate) fn begin_slice(&mut self, now: Duration) {
		self.slice_start = now;
		self.yield_requested = false;
	}

	pub(crate) fn should_yield(&self, now: Duration) -> bool {
		if self.yield_requested {
			return true;
		}
		let elapsed = now.saturating_sub(self.slice_start);
		if elapsed < self.frame_budget {
			return false;
		}
		let Some(signals) = self.signals else {
			return true;
		};
		if signals.needs_paint || signals.input_pending {
			return true;
		}
		if elapsed < self.continuous_input_budget {
			return signals.continuous_input_pending;
		}
		elapsed >= self.max_slice
	}

	pub(crate) fn request_yield(&mut self) {
		self.yield_requested = true;
	}

	pub(crate) fn clear_yield_request(&mut self) {
		self.yield_requested = false;
	}

	pub(crate) fn set_host_signals(&mut self, signals: Option<HostSignals>) {
		self.signals = signals;
	}

	/// Overrides the frame budget from a target frame rate. Zero restores the default.
	pub(crate) fn force_frame_rate(&mut self, fps: u32, default_budget: Duration) -> Result<(), SchedulerError> {
		match fps {
			0 => self.frame_budget = default_budget,
			1..=125 => self.frame_budget = Duration::from_micros(1_000_000 / u64::from(fps)),
			_ => return Err(SchedulerError::FrameRate(fps)),
		}
		Ok(())
	}

	pub(crate) fn frame_budget(&self) -> Duration {
		self.frame_budget
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	fn controller() -> YieldController {
		let mut controller = YieldController::new(&SchedulerConfig::default());
		controller.begin_slice(ms(100));
		controller
	}

	#[test]
	fn test_yields_after_frame_budget_without_host_signals() {
		let controller = controller();
		assert!(!controller.should_yield(ms(104)));
		assert!(controller.should_yield(ms(105)));
	}

	#[test]
	fn test_idle_host_widens_slice_to_max() {
		let mut controller = controller();
		controller.set_host_signals(Some(HostSignals::default()));
		assert!(!controller.should_yield(ms(150)));
		assert!(!controller.should_yield(ms(399)));
		assert!(controller.should_yield(ms(400)));
	}

	#[test]
	fn test_pending_input_yields_once_budget_spent() {
		let mut controller = controller();
		controller.set_host_signals(Some(HostSignals {
			input_pending: true,
			..HostSignals::default()
		}));
		assert!(!controller.should_yield(ms(101)));
		assert!(controller.should_yield(ms(106)));
	}

	#[test]
	fn test_continuous_input_yields_inside_continuous_window() {
		let mut controller = controller();
		controller.set_host_signals(Some(HostSignals {
			continuous_input_pending: true,
			..HostSignals::default()
		}));
		assert!(controller.should_yield(ms(110)));
	}

	#[test]
	fn test_requested_yield_overrides_budget() {
		let mut controller = controller();
		controller.request_yield();
		assert!(controller.should_yield(ms(100)));
		controller.begin_slice(ms(200));
		assert!(!controller.should_yield(ms(200)));
	}

	#[test]
	fn test_force_frame_rate_bounds() {
		let mut controller = controller();
		controller.force_frame_rate(60, ms(5)).unwrap();
		assert_eq!(controller.frame_budget(), Duration::from_micros(16_666));
		controller.force_frame_rate(0, ms(5)).unwrap();
		assert_eq!(controller.frame_budget(), ms(5));
		assert!(matches!(controller.force_frame_rate(240, ms(5)), Err(SchedulerError::FrameRate(240))));
	}
}
