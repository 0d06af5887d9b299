//! Interruptible render loop.
//!
//! A render walks the work-in-progress tree one unit at a time. Between
//! units the loop asks the scheduler whether to yield; the cursor survives a
//! yield so the next slice resumes where this one stopped. A render for
//! different lanes discards the partial tree and starts over.
//!
//! # Invariants
//!
//! * Units allocated by a render are tracked in [`RenderState::fresh`] and
//!   freed when the render is discarded.
//! * The committed tree is only replaced by [`RootState::commit_root`].

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashSet;
use weft_scheduler::{Scheduler, TaskHandle};

use crate::arena::{Arena, UnitId};
use crate::boundary::{HydrationQueue, Ping, Pinger, RetryRegistry};
use crate::config::ReconcilerConfig;
use crate::error::{InvariantViolation, ReconcileError, RenderError, Result};
use crate::lane::{Lane, Lanes};
use crate::profiler::{RenderProfile, RenderTimer};
use crate::resource::{Wakeable, WakeableId};
use crate::root_lanes::RootLanes;
use crate::unit::{Unit, UnitTag};
use crate::update_queue::{Processed, UpdateQueue};

/// Where a root is in its render/commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPhase {
	/// No render in flight.
	Idle,
	/// A render of these lanes is in progress or yielded.
	Rendering(Lanes),
	/// The last render of these lanes suspended with no boundary to catch it.
	Suspended(Lanes),
	/// A finished tree for these lanes is waiting to commit.
	Completed(Lanes),
	/// Mutations are being applied.
	Committing,
}

/// Result of beginning one unit.
pub(crate) enum Step {
	/// Descend into this child next.
	Continue(UnitId),
	/// The unit has no work below it.
	Complete,
	/// A component is waiting on data.
	Suspend(Arc<dyn Wakeable>),
	/// A component failed.
	Error(RenderError),
}

pub(crate) enum RenderExit {
	Yielded,
	Completed,
	Suspended,
}

pub(crate) struct RenderState {
	pub(crate) lanes: Lanes,
	pub(crate) root: UnitId,
	pub(crate) next: Option<UnitId>,
	/// Units allocated by this render with no committed counterpart.
	pub(crate) fresh: FxHashSet<UnitId>,
	pub(crate) update: Option<Processed>,
	/// Lanes updated while this render was in flight.
	pub(crate) interleaved: Lanes,
	pub(crate) timer: RenderTimer,
}

pub(crate) struct FinishedWork {
	pub(crate) root: UnitId,
	pub(crate) lanes: Lanes,
	pub(crate) fresh: FxHashSet<UnitId>,
	pub(crate) update: Option<Processed>,
	pub(crate) interleaved: Lanes,
	pub(crate) timer: RenderTimer,
}

/// Everything a root owns apart from its host and scheduler.
pub(crate) struct RootState<N> {
	pub(crate) arena: Arena<N>,
	/// Root unit of the committed tree.
	pub(crate) current: UnitId,
	pub(crate) lanes: RootLanes,
	pub(crate) queue: UpdateQueue,
	pub(crate) config: ReconcilerConfig,
	pub(crate) render: Option<RenderState>,
	pub(crate) finished: Option<FinishedWork>,
	pub(crate) registry: RetryRegistry,
	pub(crate) hydration: HydrationQueue,
	pub(crate) pinger: Pinger,
	/// Root-level suspensions already listening, by resource and lanes.
	pub(crate) ping_cache: FxHashSet<(WakeableId, Lanes)>,
	pub(crate) callback: Option<TaskHandle>,
	pub(crate) phase: RootPhase,
	pub(crate) profiles: Vec<RenderProfile>,
	/// Renders discarded since the last commit.
	pub(crate) restarts: u32,
}

impl<N: Clone> RootState<N> {
	pub(crate) fn new(container: N, config: ReconcilerConfig, pinger: Pinger) -> Self {
		let mut arena = Arena::default();
		let identity = arena.next_identity();
		let mut root = Unit::new(identity, UnitTag::Root, None, None);
		root.host_node = Some(container);
		let current = arena.insert(root);
		Self {
			arena,
			current,
			lanes: RootLanes::default(),
			queue: UpdateQueue::default(),
			config,
			render: None,
			finished: None,
			registry: RetryRegistry::default(),
			hydration: HydrationQueue::default(),
			pinger,
			ping_cache: FxHashSet::default(),
			callback: None,
			phase: RootPhase::Idle,
			profiles: Vec::new(),
			restarts: 0,
		}
	}

	/// Lanes of the render in flight, if any.
	pub(crate) fn wip_lanes(&self) -> Lanes {
		self.render.as_ref().map_or(Lanes::empty(), |render| render.lanes)
	}

	pub(crate) fn render_lanes(&self) -> Result<Lanes, InvariantViolation> {
		self.render.as_ref().map(|render| render.lanes).ok_or(InvariantViolation::MissingRenderState)
	}

	pub(crate) fn render_mut(&mut self) -> Result<&mut RenderState, InvariantViolation> {
		self.render.as_mut().ok_or(InvariantViolation::MissingRenderState)
	}

	/// Records an update at `lane`, remembering it if a render is in flight.
	pub(crate) fn mark_root_updated(&mut self, lane: Lane) {
		self.lanes.mark_updated(lane);
		if let Some(render) = &mut self.render {
			render.interleaved |= lane;
		}
		if let Some(finished) = &mut self.finished {
			finished.interleaved |= lane;
		}
	}

	/// Marks `lane` on a committed unit and `child_lanes` on its ancestors,
	/// in both buffers.
	pub(crate) fn mark_path(&mut self, id: UnitId, lane: Lane) -> Result<()> {
		let unit = self.arena.get_mut(id)?;
		unit.lanes |= lane;
		let (alternate, mut parent) = (unit.alternate, unit.parent);
		if let Some(alternate) = alternate
			&& let Ok(alternate) = self.arena.get_mut(alternate)
		{
			alternate.lanes |= lane;
		}
		while let Some(ancestor) = parent {
			let unit = self.arena.get_mut(ancestor)?;
			unit.child_lanes |= lane;
			let alternate = unit.alternate;
			parent = unit.parent;
			if let Some(alternate) = alternate
				&& let Ok(alternate) = self.arena.get_mut(alternate)
			{
				alternate.child_lanes |= lane;
			}
		}
		Ok(())
	}

	/// Works on `lanes` until the tree completes, suspends or the scheduler
	/// asks to yield.
	pub(crate) fn render_root(&mut self, lanes: Lanes, time_slice: bool, scheduler: &Scheduler) -> Result<RenderExit> {
		if self.render.as_ref().map(|render| render.lanes) != Some(lanes) {
			if let Some(render) = &self.render {
				tracing::debug!(from = ?render.lanes, to = ?lanes, "render.restart");
				self.restarts += 1;
				self.discard_render();
			}
			self.prepare_fresh_stack(lanes, scheduler.now())?;
		}
		self.phase = RootPhase::Rendering(lanes);
		let _span = tracing::trace_span!("render", lanes = ?lanes, time_slice).entered();

		loop {
			let render = self.render_mut()?;
			let Some(unit) = render.next else {
				self.finish_render()?;
				return Ok(RenderExit::Completed);
			};
			if time_slice && scheduler.should_yield() {
				render.timer.yields += 1;
				tracing::trace!(lanes = ?lanes, "render.yield");
				return Ok(RenderExit::Yielded);
			}
			render.timer.units += 1;
			if let Some(resource) = self.perform_unit_of_work(unit)? {
				self.suspend_root(lanes, resource);
				return Ok(RenderExit::Suspended);
			}
		}
	}

	fn prepare_fresh_stack(&mut self, lanes: Lanes, now: Duration) -> Result<()> {
		if !self.lanes.pending().contains(lanes) {
			return Err(InvariantViolation::LanesNotPending(lanes.bits()).into());
		}
		let root = self.create_work_in_progress(self.current, None)?;
		tracing::debug!(lanes = ?lanes, "render.start");
		self.render = Some(RenderState {
			lanes,
			root,
			next: Some(root),
			fresh: FxHashSet::default(),
			update: None,
			interleaved: Lanes::empty(),
			timer: RenderTimer::start(now, self.restarts),
		});
		Ok(())
	}

	/// Begins one unit and moves the cursor. Returns the resource when the
	/// whole root suspended.
	fn perform_unit_of_work(&mut self, id: UnitId) -> Result<Option<Arc<dyn Wakeable>>> {
		match self.begin_work(id)? {
			Step::Continue(child) => self.set_next(Some(child))?,
			Step::Complete => self.complete_unit_of_work(id)?,
			Step::Suspend(resource) => return self.throw_suspend(id, resource),
			Step::Error(error) => self.throw_error(id, error)?,
		}
		Ok(None)
	}

	pub(crate) fn set_next(&mut self, next: Option<UnitId>) -> Result<()> {
		self.render_mut()?.next = next;
		Ok(())
	}

	fn finish_render(&mut self) -> Result<()> {
		let render = self.render.take().ok_or(InvariantViolation::MissingRenderState)?;
		tracing::debug!(lanes = ?render.lanes, units = render.timer.units, "render.complete");
		self.phase = RootPhase::Completed(render.lanes);
		self.finished = Some(FinishedWork {
			root: render.root,
			lanes: render.lanes,
			fresh: render.fresh,
			update: render.update,
			interleaved: render.interleaved,
			timer: render.timer,
		});
		Ok(())
	}

	/// Throws the partial tree away and parks the lanes until `resource` pings.
	fn suspend_root(&mut self, lanes: Lanes, resource: Arc<dyn Wakeable>) {
		self.discard_render();
		self.lanes.mark_suspended(lanes);
		self.phase = RootPhase::Suspended(lanes);
		let id = resource.id();
		tracing::debug!(lanes = ?lanes, resource = %id, "render.root_suspended");
		if self.ping_cache.insert((id, lanes)) {
			resource.then(self.pinger.listener(Ping::Root { resource: id, lanes }));
		}
	}

	/// Frees every unit the in-flight render allocated.
	pub(crate) fn discard_render(&mut self) {
		if let Some(render) = self.render.take() {
			for id in render.fresh {
				self.arena.remove(id);
			}
		}
		if matches!(self.phase, RootPhase::Rendering(_)) {
			self.phase = RootPhase::Idle;
		}
	}

	/// Drops a finished tree that failed to commit.
	pub(crate) fn discard_finished(&mut self, finished: FinishedWork) {
		for id in finished.fresh {
			self.arena.remove(id);
		}
	}

	/// Cleans up after a render pass failed with `error`.
	///
	/// An uncaught render error also drops every pending update, so the next
	/// update starts from the committed tree.
	pub(crate) fn recover_from_render_failure(&mut self, error: &ReconcileError) {
		self.discard_render();
		self.phase = RootPhase::Idle;
		if matches!(error, ReconcileError::Render(_)) {
			self.abort_pending_work();
		}
	}

	/// Clears every pending lane and update.
	pub(crate) fn abort_pending_work(&mut self) {
		let committed = self.arena.get(self.current).ok().and_then(|root| root.memoized.clone());
		self.discard_render();
		self.lanes.abort_all();
		self.queue.clear(committed);
		tracing::warn!("root.work_aborted");
	}
}

