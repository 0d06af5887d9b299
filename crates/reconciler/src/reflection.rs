//! Queries over the committed tree.
//!
//! A [`UnitId`] handed out by the root may point at either buffer of a
//! unit. Every query here first resolves it to the committed buffer by
//! identity, so callers never observe a half-rendered tree.

use smallvec::SmallVec;

use crate::arena::UnitId;
use crate::error::Result;
use crate::unit::{BoundaryState, Identity, Unit, UnitTag};
use crate::work_loop::RootState;

impl<N: Clone> RootState<N> {
	/// Pre-order search of the committed tree below and including `from`.
	fn find_committed<F>(&self, from: UnitId, mut matches: F) -> Result<Option<UnitId>>
	where
		F: FnMut(&Unit<N>) -> bool,
	{
		let mut stack: SmallVec<[UnitId; 16]> = SmallVec::new();
		stack.push(from);
		while let Some(id) = stack.pop() {
			let unit = self.arena.get(id)?;
			if matches(unit) {
				return Ok(Some(id));
			}
			if id != from {
				stack.extend(unit.sibling);
			}
			stack.extend(unit.child);
		}
		Ok(None)
	}

	pub(crate) fn find_current_by_identity(&self, identity: Identity) -> Result<Option<UnitId>> {
		self.find_committed(self.current, |unit| unit.identity == identity)
	}

	/// Resolves a handle to the committed buffer of its unit.
	pub(crate) fn current_of(&self, id: UnitId) -> Option<UnitId> {
		let identity = self.arena.get(id).ok()?.identity;
		self.find_current_by_identity(identity).ok().flatten()
	}

	/// First committed unit carrying `key`.
	pub(crate) fn find_keyed(&self, key: &str) -> Option<UnitId> {
		self.find_committed(self.current, |unit| unit.key.as_deref() == Some(key)).ok().flatten()
	}

	/// The unit itself when mounted, else its nearest mounted ancestor.
	pub(crate) fn nearest_mounted(&self, id: UnitId) -> Option<UnitId> {
		let mut cursor = Some(id);
		while let Some(candidate) = cursor {
			if let Some(current) = self.current_of(candidate) {
				return Some(current);
			}
			cursor = self.arena.get(candidate).ok()?.parent;
		}
		None
	}

	/// First host unit at or below the committed buffer of `id`.
	pub(crate) fn find_current_host_unit(&self, id: UnitId) -> Option<UnitId> {
		let current = self.current_of(id)?;
		self.find_committed(current, |unit| unit.tag.is_host() && unit.host_node.is_some()).ok().flatten()
	}

	pub(crate) fn find_current_host_node(&self, id: UnitId) -> Option<N> {
		let host = self.find_current_host_unit(id)?;
		self.arena.get(host).ok()?.host_node.clone()
	}

	pub(crate) fn boundary_state(&self, id: UnitId) -> Option<BoundaryState> {
		let unit = self.arena.get(self.current_of(id)?).ok()?;
		(unit.tag == UnitTag::Boundary).then_some(unit.boundary)
	}

	pub(crate) fn is_boundary_showing_fallback(&self, id: UnitId) -> bool {
		self.boundary_state(id).is_some_and(|state| state.showing_fallback)
	}

	/// Returns true when `descendant` is committed at or below `ancestor`.
	pub(crate) fn contains(&self, ancestor: UnitId, descendant: UnitId) -> bool {
		let (Some(ancestor), Ok(descendant)) = (self.current_of(ancestor), self.arena.get(descendant)) else {
			return false;
		};
		let identity = descendant.identity;
		self.find_committed(ancestor, |unit| unit.identity == identity).ok().flatten().is_some()
	}

	/// Committed children of `id`, in order.
	pub(crate) fn children(&self, id: UnitId) -> Vec<UnitId> {
		let mut children = Vec::new();
		let Some(current) = self.current_of(id) else {
			return children;
		};
		let mut cursor = self.arena.get(current).ok().and_then(|unit| unit.child);
		while let Some(child) = cursor {
			children.push(child);
			cursor = self.arena.get(child).ok().and_then(|unit| unit.sibling);
		}
		children
	}

	pub(crate) fn tag(&self, id: UnitId) -> Option<UnitTag> {
		self.arena.get(id).ok().map(|unit| unit.tag)
	}
}

