//! Begin phase: render one unit and reconcile its children.

use crate::arena::UnitId;
use crate::element::{Element, ElementKind, RenderContext, RenderSignal};
use crate::error::Result;
use crate::lane::Lanes;
use crate::unit::{BoundaryState, Flags, UnitTag};
use crate::work_loop::{RootState, Step};

/// Key of the slot holding a boundary's content.
const PRIMARY_SLOT: &str = "primary";
/// Key of the slot holding a boundary's fallback.
const FALLBACK_SLOT: &str = "fallback";

impl<N: Clone> RootState<N> {
	pub(crate) fn begin_work(&mut self, id: UnitId) -> Result<Step> {
		let render_lanes = self.render_lanes()?;
		let unit = self.arena.get(id)?;
		let tag = unit.tag;
		let had_lanes = unit.lanes.intersects(render_lanes);
		let captured = unit.flags.contains(Flags::DID_CAPTURE);
		let unchanged = match (unit.alternate, &unit.element) {
			(Some(current), Some(element)) if tag != UnitTag::Root => self
				.arena
				.get(current)?
				.memoized
				.as_ref()
				.is_some_and(|memoized| memoized.same(element)),
			_ => false,
		};
		if unchanged && !had_lanes && !captured {
			return self.bailout(id, render_lanes);
		}

		let unit = self.arena.get_mut(id)?;
		unit.lanes = Lanes::empty();
		let element = unit.element.clone();
		if tag == UnitTag::Root {
			return self.begin_root(id, render_lanes);
		}
		let Some(element) = element else {
			return Ok(Step::Complete);
		};

		let children = match element.kind() {
			ElementKind::Host { children, .. } | ElementKind::Fragment { children } => children.clone(),
			ElementKind::Text(_) => return Ok(Step::Complete),
			ElementKind::Component(component) => {
				tracing::trace!(component = component.kind(), unit = ?id, "render.component");
				let mut cx = RenderContext::new(render_lanes);
				match component.render(&mut cx) {
					Ok(children) => children,
					Err(RenderSignal::Suspend(resource)) => return Ok(Step::Suspend(resource)),
					Err(RenderSignal::Error(error)) => return Ok(Step::Error(error)),
				}
			}
			ElementKind::Boundary { fallback, children, deferred } => {
				let show_fallback = self.begin_boundary(id, render_lanes, had_lanes, *deferred)?;
				let slot = if show_fallback {
					Element::fragment(fallback.iter().cloned()).with_key(FALLBACK_SLOT)
				} else {
					Element::fragment(children.iter().cloned()).with_key(PRIMARY_SLOT)
				};
				vec![slot]
			}
			ElementKind::Catch { fallback, children } => match self.arena.get(id)?.captured_error.clone() {
				Some(error) => fallback(&error),
				None => children.clone(),
			},
		};
		self.reconcile_children(id, children)?;
		self.first_child_step(id)
	}

	/// Applies the root update queue and reconciles the new root element.
	fn begin_root(&mut self, id: UnitId, render_lanes: Lanes) -> Result<Step> {
		let processed = self.queue.process(render_lanes);
		let next = processed.state.clone();
		self.render_mut()?.update = Some(processed);

		let previous = match self.arena.get(id)?.alternate {
			Some(current) => self.arena.get(current)?.memoized.clone(),
			None => None,
		};
		self.arena.get_mut(id)?.element = next.clone();
		let unchanged = match (&previous, &next) {
			(None, None) => true,
			(Some(previous), Some(next)) => previous.same(next),
			_ => false,
		};
		if unchanged {
			return self.bailout(id, render_lanes);
		}
		self.reconcile_children(id, next.into_iter().collect())?;
		self.first_child_step(id)
	}

	/// Decides whether a boundary shows its fallback this pass and updates
	/// its state.
	fn begin_boundary(&mut self, id: UnitId, render_lanes: Lanes, had_lanes: bool, deferred: bool) -> Result<bool> {
		let current = match self.arena.get(id)?.alternate {
			Some(current) => Some(self.arena.get(current)?.boundary),
			None => None,
		};
		let unit = self.arena.get_mut(id)?;
		let mut state = unit.boundary;
		let show_fallback = if unit.flags.contains(Flags::DID_CAPTURE) {
			state.dehydrated = false;
			true
		} else {
			match current {
				None if deferred && !render_lanes.intersects(Lanes::OFFSCREEN) => {
					state = BoundaryState {
						dehydrated: true,
						showing_fallback: true,
						retry_lane: Lanes::OFFSCREEN,
					};
					unit.lanes |= Lanes::OFFSCREEN;
					tracing::debug!(unit = ?id, "render.boundary.dehydrated");
					true
				}
				Some(current) if current.dehydrated && !had_lanes => {
					unit.lanes |= current.retry_lane;
					true
				}
				Some(current) if current.dehydrated => {
					state.dehydrated = false;
					tracing::debug!(unit = ?id, "render.boundary.hydrate");
					false
				}
				_ => false,
			}
		};
		state.showing_fallback = show_fallback;
		unit.boundary = state;
		Ok(show_fallback)
	}

	/// Skips a unit whose input did not change.
	///
	/// Descendants with work in the render lanes still get cloned so the loop
	/// can reach them.
	fn bailout(&mut self, id: UnitId, render_lanes: Lanes) -> Result<Step> {
		if !self.arena.get(id)?.child_lanes.intersects(render_lanes) {
			tracing::trace!(unit = ?id, "render.bailout");
			return Ok(Step::Complete);
		}
		self.clone_children(id)?;
		self.first_child_step(id)
	}

	pub(crate) fn first_child_step(&self, id: UnitId) -> Result<Step> {
		Ok(match self.arena.get(id)?.child {
			Some(child) => Step::Continue(child),
			None => Step::Complete,
		})
	}
}
