//! Root driver.
//!
//! A [`Root`] ties one tree to a host and a scheduler. Updates mark lanes and
//! make sure exactly one scheduler task works on the root at the priority of
//! its most urgent pending lane. That task renders, yields when the
//! scheduler asks, and commits as soon as the tree completes.
//!
//! # Borrowing
//!
//! Root state, host and scheduler sit in separate cells. Component render
//! runs with the state borrowed, so a component that touches its own root
//! gets [`InvariantViolation::Reentrant`]. Commit callbacks run with nothing
//! borrowed and may update the root freely.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use weft_scheduler::{Priority, Scheduler, TaskError, TaskOutcome, TaskRun, WakeHookId};

use crate::arena::UnitId;
use crate::boundary::{Ping, Pinger};
use crate::commit::{CommitOutcome, CommitReport};
use crate::config::ReconcilerConfig;
use crate::element::Element;
use crate::error::{InvariantViolation, ReconcileError, Result};
use crate::host::Host;
use crate::lane::{Lane, Lanes};
use crate::profiler::RenderProfile;
use crate::root_lanes::RootLanes;
use crate::unit::{BoundaryState, UnitTag};
use crate::update_queue::{CommitCallback, Payload};
use crate::work_loop::{RenderExit, RootPhase, RootState};

/// Handle to a reconciled tree. Dropping it cancels the root's pending task.
pub struct Root<H: Host + 'static> {
	inner: Rc<RootInner<H>>,
}

struct RootInner<H: Host> {
	this: Weak<RootInner<H>>,
	state: RefCell<RootState<H::Node>>,
	host: RefCell<H>,
	scheduler: Scheduler,
	wake_hook: WakeHookId,
	nested_update_limit: u32,
	/// Set while this root renders, commits or runs commit callbacks.
	working: Cell<bool>,
	nested_sync_commits: Cell<u32>,
}

/// Restores the working flag when a unit of root work ends.
struct WorkGuard<'a> {
	flag: &'a Cell<bool>,
	previous: bool,
}

impl Drop for WorkGuard<'_> {
	fn drop(&mut self) {
		self.flag.set(self.previous);
	}
}

impl<H: Host + 'static> Root<H> {
	/// Creates an empty root rendering into `container`.
	pub fn new(host: H, container: H::Node, scheduler: &Scheduler, config: ReconcilerConfig) -> Self {
		let inner = Rc::new_cyclic(|this: &Weak<RootInner<H>>| {
			let hook = this.clone();
			let waker = scheduler.register_wake_hook(move || {
				if let Some(inner) = hook.upgrade()
					&& let Err(error) = inner.process_pings()
				{
					tracing::warn!(error = %error, "root.ping_failed");
				}
			});
			RootInner {
				this: this.clone(),
				wake_hook: waker.id(),
				state: RefCell::new(RootState::new(container, config, Pinger::new(waker))),
				host: RefCell::new(host),
				scheduler: scheduler.clone(),
				nested_update_limit: config.nested_update_limit,
				working: Cell::new(false),
				nested_sync_commits: Cell::new(0),
			}
		});
		tracing::debug!(?config, "root.created");
		Self { inner }
	}

	/// Schedules a replacement of the whole tree at the default lane.
	pub fn render(&self, element: Element) -> Result<()> {
		self.request_update(Lanes::DEFAULT, Payload::Replace(element))
	}

	/// Queues an update at `lane`.
	///
	/// A sync update requested outside of root work renders and commits
	/// before this returns.
	pub fn request_update(&self, lane: Lane, payload: Payload) -> Result<()> {
		self.inner.request_update(lane, payload, None)
	}

	/// Like [`Root::request_update`], running `callback` after the commit
	/// that applies the update.
	pub fn request_update_with<F>(&self, lane: Lane, payload: Payload, callback: F) -> Result<()>
	where
		F: Fn() + 'static,
	{
		self.inner.request_update(lane, payload, Some(Rc::new(callback) as CommitCallback))
	}

	/// Lane for an update issued at a scheduler priority. Low priority claims
	/// a fresh transition lane.
	pub fn request_lane(&self, priority: Priority) -> Result<Lane> {
		match priority {
			Priority::Low => self.claim_transition_lane(),
			priority => Ok(Lanes::for_priority(priority)),
		}
	}

	pub fn claim_transition_lane(&self) -> Result<Lane> {
		Ok(self.inner.borrow_state()?.lanes.claim_next_transition_lane())
	}

	/// Queues every payload on its own transition lane and entangles the
	/// lanes so they render and commit together. Returns the lanes used.
	pub fn batch_transitions<I>(&self, payloads: I) -> Result<Lanes>
	where
		I: IntoIterator<Item = Payload>,
	{
		let mut state = self.inner.borrow_state()?;
		let mut batch = Lanes::empty();
		for payload in payloads {
			let lane = state.lanes.claim_next_transition_lane();
			state.queue.push(lane, payload, None);
			state.mark_root_updated(lane);
			batch |= lane;
		}
		state.lanes.mark_entangled(batch);
		tracing::debug!(lanes = ?batch, "root.transition_batch");
		self.inner.ensure_root_is_scheduled(&mut state);
		Ok(batch)
	}

	/// Asks for a dehydrated boundary to hydrate at `lane`.
	///
	/// The most recent request goes first among equal lanes; only the front
	/// request is boosted at a time.
	pub fn request_boundary_priority(&self, boundary: UnitId, lane: Lane) -> Result<()> {
		let inline = {
			let mut state = self.inner.borrow_state()?;
			let current = state.current_of(boundary).ok_or(InvariantViolation::StaleUnit(boundary))?;
			let identity = state.arena.get(current)?.identity;
			if state.hydration.push(identity, lane) {
				tracing::debug!(unit = ?current, lane = ?lane, "root.hydration_target");
			}
			state.advance_hydration_targets()?;
			let inline = lane == Lanes::SYNC && !self.inner.working.get();
			if !inline {
				self.inner.ensure_root_is_scheduled(&mut state);
			}
			inline
		};
		if inline {
			self.inner.nested_sync_commits.set(0);
			self.inner.flush_sync_work()?;
		}
		Ok(())
	}

	/// Renders and commits pending sync work right away.
	pub fn flush_sync(&self) -> Result<()> {
		self.inner.flush_sync_work()
	}

	/// Commits a finished tree that is waiting, if any.
	pub fn commit(&self) -> Result<CommitOutcome> {
		let report = {
			let mut state = self.inner.borrow_state()?;
			self.inner.commit_locked(&mut state)?
		};
		let outcome = match &report {
			Some(report) => CommitOutcome::Committed(report.lanes),
			None => CommitOutcome::NothingToCommit,
		};
		if report.is_some() {
			self.inner.after_commit(report)?;
			self.inner.ensure_root_is_scheduled(&mut *self.inner.borrow_state()?);
		}
		Ok(outcome)
	}

	pub fn phase(&self) -> Result<RootPhase> {
		Ok(self.inner.read_state()?.phase)
	}

	/// Snapshot of the root's lane bookkeeping.
	pub fn lanes(&self) -> Result<RootLanes> {
		Ok(self.inner.read_state()?.lanes.clone())
	}

	pub fn has_pending_work(&self) -> bool {
		self.inner.read_state().is_ok_and(|state| !state.lanes.pending().is_empty())
	}

	/// Drains the profiles recorded since the last call.
	pub fn take_profiles(&self) -> Result<Vec<RenderProfile>> {
		Ok(std::mem::take(&mut self.inner.borrow_state()?.profiles))
	}

	/// Number of units currently allocated for this root.
	pub fn allocated_units(&self) -> usize {
		self.inner.read_state().map_or(0, |state| state.arena.len())
	}

	pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> Result<R> {
		let host = self.inner.host.try_borrow().map_err(|_| InvariantViolation::Reentrant)?;
		Ok(f(&host))
	}

	pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> Result<R> {
		let mut host = self.inner.host.try_borrow_mut().map_err(|_| InvariantViolation::Reentrant)?;
		Ok(f(&mut host))
	}

	/// Root unit of the committed tree.
	pub fn current(&self) -> Option<UnitId> {
		self.inner.read_state().ok().map(|state| state.current)
	}

	/// First committed unit with this key.
	pub fn find_keyed(&self, key: &str) -> Option<UnitId> {
		self.inner.read_state().ok()?.find_keyed(key)
	}

	/// The committed buffer of `unit`, or of its nearest mounted ancestor.
	pub fn nearest_mounted(&self, unit: UnitId) -> Option<UnitId> {
		self.inner.read_state().ok()?.nearest_mounted(unit)
	}

	/// First host unit at or below `unit` in the committed tree.
	pub fn find_current_host_unit(&self, unit: UnitId) -> Option<UnitId> {
		self.inner.read_state().ok()?.find_current_host_unit(unit)
	}

	pub fn find_current_host_node(&self, unit: UnitId) -> Option<H::Node> {
		self.inner.read_state().ok()?.find_current_host_node(unit)
	}

	pub fn is_boundary_showing_fallback(&self, boundary: UnitId) -> bool {
		self.inner.read_state().is_ok_and(|state| state.is_boundary_showing_fallback(boundary))
	}

	pub fn boundary_state(&self, boundary: UnitId) -> Option<BoundaryState> {
		self.inner.read_state().ok()?.boundary_state(boundary)
	}

	/// Returns true when `descendant` is committed at or below `ancestor`.
	pub fn contains(&self, ancestor: UnitId, descendant: UnitId) -> bool {
		self.inner.read_state().is_ok_and(|state| state.contains(ancestor, descendant))
	}

	pub fn children(&self, unit: UnitId) -> Vec<UnitId> {
		self.inner.read_state().map(|state| state.children(unit)).unwrap_or_default()
	}

	pub fn tag(&self, unit: UnitId) -> Option<UnitTag> {
		self.inner.read_state().ok()?.tag(unit)
	}
}

impl<H: Host + 'static> RootInner<H> {
	fn borrow_state(&self) -> Result<RefMut<'_, RootState<H::Node>>> {
		self.state.try_borrow_mut().map_err(|_| InvariantViolation::Reentrant.into())
	}

	fn read_state(&self) -> Result<Ref<'_, RootState<H::Node>>> {
		self.state.try_borrow().map_err(|_| InvariantViolation::Reentrant.into())
	}

	fn enter_work(&self) -> WorkGuard<'_> {
		WorkGuard {
			flag: &self.working,
			previous: self.working.replace(true),
		}
	}

	fn request_update(&self, lane: Lane, payload: Payload, callback: Option<CommitCallback>) -> Result<()> {
		{
			let mut state = self.borrow_state()?;
			tracing::trace!(lane = ?lane, ?payload, "root.update");
			state.queue.push(lane, payload, callback);
			state.mark_root_updated(lane);
			if lane != Lanes::SYNC || self.working.get() {
				self.ensure_root_is_scheduled(&mut state);
				return Ok(());
			}
		}
		self.nested_sync_commits.set(0);
		self.flush_sync_work()
	}

	/// Keeps exactly one scheduler task alive for the most urgent pending lanes.
	fn ensure_root_is_scheduled(&self, state: &mut RootState<H::Node>) {
		let now = self.scheduler.now();
		state.lanes.mark_starved_as_expired(now, &state.config);
		let next = state.lanes.next_lanes(state.wip_lanes());
		if next.is_empty() {
			if let Some(task) = state.callback.take() {
				tracing::trace!(task = %task.id(), "root.unscheduled");
				self.scheduler.cancel(task);
			}
			return;
		}

		let priority = if state.lanes.includes_expired(next) {
			Priority::Immediate
		} else {
			next.to_priority()
		};
		if let Some(task) = state.callback {
			if task.priority() == priority {
				return;
			}
			self.scheduler.cancel(task);
		}
		let this = self.this.clone();
		let task = self.scheduler.schedule(priority, move |run: &TaskRun| Self::run_task(this, run));
		tracing::trace!(task = %task.id(), priority = priority.as_str(), lanes = ?next, "root.scheduled");
		state.callback = Some(task);
	}

	fn run_task(this: Weak<Self>, run: &TaskRun) -> std::result::Result<TaskOutcome, TaskError> {
		let Some(inner) = this.upgrade() else {
			return Ok(TaskOutcome::Done);
		};
		match inner.perform_concurrent_work(run) {
			Ok(true) => Ok(TaskOutcome::Continue(Box::new(move |run: &TaskRun| Self::run_task(this, run)))),
			Ok(false) => Ok(TaskOutcome::Done),
			Err(error) => Err(Box::new(error)),
		}
	}

	/// One scheduler slice of root work. Returns true when the same task
	/// should continue.
	fn perform_concurrent_work(&self, run: &TaskRun) -> Result<bool> {
		let _working = self.enter_work();
		let report = {
			let mut state = self.borrow_state()?;
			let state = &mut *state;
			state.lanes.mark_starved_as_expired(self.scheduler.now(), &state.config);
			let lanes = state.lanes.next_lanes(state.wip_lanes());
			if lanes.is_empty() {
				state.callback = None;
				return Ok(false);
			}
			let time_slice = state.config.time_slicing && !lanes.is_blocking() && !state.lanes.includes_expired(lanes) && !run.did_timeout;
			match state.render_root(lanes, time_slice, &self.scheduler) {
				Ok(RenderExit::Yielded) => {
					// A lane that expired during this slice moves the root to an immediate task.
					self.ensure_root_is_scheduled(state);
					return Ok(owns_task(state, run));
				}
				Ok(RenderExit::Suspended) => {
					self.ensure_root_is_scheduled(state);
					return Ok(owns_task(state, run));
				}
				Ok(RenderExit::Completed) => self.commit_locked(state)?,
				Err(error) => {
					state.recover_from_render_failure(&error);
					state.callback = None;
					return Err(error);
				}
			}
		};
		self.after_commit(report)?;
		self.flush_sync_work()?;
		let mut state = self.borrow_state()?;
		self.ensure_root_is_scheduled(&mut state);
		Ok(owns_task(&state, run))
	}

	/// Renders and commits sync lanes until none are left.
	fn flush_sync_work(&self) -> Result<()> {
		let _working = self.enter_work();
		loop {
			let report = {
				let mut state = self.borrow_state()?;
				let state = &mut *state;
				let lanes = state.lanes.next_lanes(state.wip_lanes());
				if !lanes.intersects(Lanes::SYNC) {
					self.ensure_root_is_scheduled(state);
					return Ok(());
				}
				match state.render_root(lanes, false, &self.scheduler) {
					Ok(RenderExit::Completed) => self.commit_locked(state)?,
					Ok(RenderExit::Suspended | RenderExit::Yielded) => {
						self.ensure_root_is_scheduled(state);
						return Ok(());
					}
					Err(error) => {
						state.recover_from_render_failure(&error);
						if let Some(task) = state.callback.take() {
							self.scheduler.cancel(task);
						}
						return Err(error);
					}
				}
			};
			self.after_commit(report)?;
		}
	}

	/// Commits with the host borrowed. A failed commit also cancels the
	/// root's task; the lanes wait for the next update.
	fn commit_locked(&self, state: &mut RootState<H::Node>) -> Result<Option<CommitReport>> {
		let mut host = self.host.try_borrow_mut().map_err(|_| InvariantViolation::Reentrant)?;
		let committed = state.commit_root(&mut *host, self.scheduler.now());
		if committed.is_err()
			&& let Some(task) = state.callback.take()
		{
			self.scheduler.cancel(task);
		}
		committed
	}

	/// Runs a commit's callbacks with nothing borrowed, enforcing the nested
	/// sync commit limit.
	fn after_commit(&self, report: Option<CommitReport>) -> Result<()> {
		let Some(report) = report else {
			return Ok(());
		};
		let nested = if report.lanes.intersects(Lanes::SYNC) {
			self.nested_sync_commits.get() + 1
		} else {
			0
		};
		self.nested_sync_commits.set(nested);
		if nested > self.nested_update_limit {
			self.nested_sync_commits.set(0);
			let mut state = self.borrow_state()?;
			state.abort_pending_work();
			if let Some(task) = state.callback.take() {
				self.scheduler.cancel(task);
			}
			tracing::warn!(limit = self.nested_update_limit, "root.update_depth_exceeded");
			return Err(ReconcileError::UpdateDepthExceeded {
				limit: self.nested_update_limit,
			});
		}
		let _working = self.enter_work();
		for callback in report.callbacks {
			callback();
		}
		Ok(())
	}

	/// Applies pings delivered by resolved resources.
	fn process_pings(&self) -> Result<()> {
		let mut state = self.borrow_state()?;
		let state = &mut *state;
		let pings = state.pinger.drain();
		for ping in pings {
			match ping {
				Ping::Root { resource, lanes } => {
					tracing::debug!(resource = %resource, lanes = ?lanes, "root.pinged");
					state.ping_cache.remove(&(resource, lanes));
					state.lanes.mark_pinged(lanes);
				}
				Ping::Retry { boundary, resource } => {
					let Some(lane) = state.registry.resolve(boundary, resource) else {
						continue;
					};
					match state.find_current_by_identity(boundary)? {
						Some(unit) => {
							tracing::debug!(unit = ?unit, resource = %resource, lane = ?lane, "root.retry");
							state.mark_path(unit, lane)?;
							state.mark_root_updated(lane);
						}
						None => tracing::trace!(resource = %resource, "root.retry_unmounted"),
					}
				}
			}
		}
		self.ensure_root_is_scheduled(state);
		Ok(())
	}
}

fn owns_task<N>(state: &RootState<N>, run: &TaskRun) -> bool {
	state.callback.is_some_and(|task| task.id() == run.id)
}

impl<H: Host> Drop for RootInner<H> {
	fn drop(&mut self) {
		self.scheduler.unregister_wake_hook(self.wake_hook);
		if let Some(task) = self.state.get_mut().callback.take() {
			self.scheduler.cancel(task);
		}
	}
}
