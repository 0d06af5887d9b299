//! Unwinding: route a suspension or render error to the nearest boundary.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::arena::UnitId;
use crate::error::{ReconcileError, RenderError, Result};
use crate::resource::Wakeable;
use crate::unit::{Flags, UnitTag};
use crate::work_loop::RootState;

impl<N: Clone> RootState<N> {
	/// Hands a suspension to the nearest boundary that can still show its
	/// fallback. Returns the resource back when no boundary can.
	pub(crate) fn throw_suspend(&mut self, id: UnitId, resource: Arc<dyn Wakeable>) -> Result<Option<Arc<dyn Wakeable>>> {
		let Some(boundary) = self.capturing_ancestor(id, UnitTag::Boundary)? else {
			return Ok(Some(resource));
		};
		let current_lane = self.arena.get(boundary)?.boundary.retry_lane;
		let retry_lane = if current_lane.is_retry_only() {
			current_lane
		} else {
			self.lanes.claim_next_retry_lane()
		};

		let unit = self.arena.get_mut(boundary)?;
		unit.boundary.retry_lane = retry_lane;
		unit.boundary.dehydrated = false;
		unit.flags |= Flags::DID_CAPTURE;
		let resource_id = resource.id();
		if !unit.retry_resources.iter().any(|held| held.id() == resource_id) {
			unit.retry_resources.push(resource);
		}
		tracing::debug!(boundary = ?boundary, resource = %resource_id, retry_lane = ?retry_lane, "render.boundary.captured");
		self.restart_from(boundary)?;
		Ok(None)
	}

	/// Hands a render error to the nearest catch unit. Without one the error
	/// is fatal for the render.
	pub(crate) fn throw_error(&mut self, id: UnitId, error: RenderError) -> Result<()> {
		let Some(catch) = self.capturing_ancestor(id, UnitTag::Catch)? else {
			tracing::warn!(error = %error, "render.error.uncaught");
			return Err(ReconcileError::Render(error));
		};
		tracing::debug!(catch = ?catch, error = %error, "render.error.captured");
		let unit = self.arena.get_mut(catch)?;
		unit.flags |= Flags::DID_CAPTURE;
		unit.captured_error = Some(error);
		self.restart_from(catch)
	}

	fn capturing_ancestor(&self, id: UnitId, tag: UnitTag) -> Result<Option<UnitId>> {
		let mut cursor = self.arena.get(id)?.parent;
		while let Some(ancestor) = cursor {
			let unit = self.arena.get(ancestor)?;
			let eligible = !unit.flags.contains(Flags::DID_CAPTURE) && !(tag == UnitTag::Boundary && unit.boundary.showing_fallback);
			if unit.tag == tag && eligible {
				return Ok(Some(ancestor));
			}
			cursor = unit.parent;
		}
		Ok(None)
	}

	/// Drops the partial work below `id` and makes it the next unit to begin.
	fn restart_from(&mut self, id: UnitId) -> Result<()> {
		let committed_child = match self.arena.get(id)?.alternate {
			Some(current) => self.arena.get(current)?.child,
			None => None,
		};

		let mut stack: SmallVec<[UnitId; 16]> = self.arena.get(id)?.child.into_iter().collect();
		let mut doomed = Vec::new();
		let render = self.render.as_ref();
		while let Some(next) = stack.pop() {
			let Ok(unit) = self.arena.get(next) else {
				continue;
			};
			stack.extend(unit.sibling);
			stack.extend(unit.child);
			if render.is_some_and(|render| render.fresh.contains(&next)) {
				doomed.push(next);
			}
		}
		for unit in doomed {
			self.arena.remove(unit);
			self.render_mut()?.fresh.remove(&unit);
		}

		let unit = self.arena.get_mut(id)?;
		unit.child = committed_child;
		unit.first_effect = None;
		unit.last_effect = None;
		self.set_next(Some(id))
	}
}
