//! Common utilities for reconciler integration tests.

use std::rc::Rc;
use std::time::Duration;

use weft_noop::{Mutation, NoopHost};
use weft_reconciler::{Component, Element, Props, ReconcilerConfig, RenderContext, RenderError, RenderProfile, RenderSignal, Resource, Root};
use weft_scheduler::{DrainOutcome, FlushError, ManualClock, Scheduler, SchedulerConfig};

/// A root on a noop host driven by a scheduler on a frozen manual clock.
pub struct Harness {
	pub clock: ManualClock,
	pub scheduler: Scheduler,
	pub root: Rc<Root<NoopHost>>,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_configs(ReconcilerConfig::default(), SchedulerConfig::default())
	}

	pub fn with_config(config: ReconcilerConfig) -> Self {
		Self::with_configs(config, SchedulerConfig::default())
	}

	pub fn with_configs(config: ReconcilerConfig, scheduler_config: SchedulerConfig) -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let clock = ManualClock::new();
		let scheduler = Scheduler::with_config(clock.clone(), scheduler_config);
		let host = NoopHost::new();
		let container = host.container();
		let root = Rc::new(Root::new(host, container, &scheduler, config));
		Self { clock, scheduler, root }
	}

	/// Runs scheduler slices until no ready work is left.
	pub fn flush(&self) {
		assert!(!self.scheduler.flush_all().unwrap().has_more_work);
	}

	pub fn try_flush(&self) -> Result<DrainOutcome, FlushError> {
		self.scheduler.flush_all()
	}

	/// Markup of the committed host tree.
	pub fn html(&self) -> String {
		self.root.with_host(NoopHost::render).unwrap()
	}

	pub fn take_log(&self) -> Vec<Mutation> {
		self.root.with_host_mut(NoopHost::take_log).unwrap()
	}

	pub fn node_count(&self) -> usize {
		self.root.with_host(NoopHost::node_count).unwrap()
	}

	pub fn profiles(&self) -> Vec<RenderProfile> {
		self.root.take_profiles().unwrap()
	}
}

pub fn host(tag: &str, children: impl IntoIterator<Item = Element>) -> Element {
	Element::host(tag, Props::new(), children)
}

pub fn text(value: &str) -> Element {
	Element::text(value)
}

/// `<ul>` with one keyed `<li>` per label.
pub fn list(labels: &[&str]) -> Element {
	host("ul", labels.iter().map(|label| host("li", [text(label)]).with_key(label)))
}

/// Advances the clock past the frame budget every time it renders, so the
/// work loop yields right after it.
pub struct Slow {
	pub clock: ManualClock,
}

impl Component for Slow {
	fn render(&self, _cx: &mut RenderContext) -> Result<Vec<Element>, RenderSignal> {
		self.clock.advance(Duration::from_millis(10));
		Ok(Vec::new())
	}
}

/// Renders the resource's value as text once it is ready.
pub struct Reader(pub Resource<String>);

impl Component for Reader {
	fn render(&self, cx: &mut RenderContext) -> Result<Vec<Element>, RenderSignal> {
		let value = cx.read(&self.0)?;
		Ok(vec![Element::text(value)])
	}
}

/// Always fails with the given message.
pub struct Failing(pub &'static str);

impl Component for Failing {
	fn render(&self, _cx: &mut RenderContext) -> Result<Vec<Element>, RenderSignal> {
		Err(RenderError::new(self.0).into())
	}
}
