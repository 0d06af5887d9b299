//! Complete phase: settle a unit's flags and bubble lanes and effects up.

use crate::arena::UnitId;
use crate::error::Result;
use crate::lane::Lanes;
use crate::unit::{Flags, UnitTag};
use crate::work_loop::RootState;

impl<N: Clone> RootState<N> {
	/// Completes `id` and every ancestor whose last child just finished,
	/// stopping at the first sibling that still needs work.
	pub(crate) fn complete_unit_of_work(&mut self, id: UnitId) -> Result<()> {
		let mut completed = id;
		loop {
			self.complete_work(completed)?;
			let unit = self.arena.get(completed)?;
			let (parent, sibling) = (unit.parent, unit.sibling);
			if let Some(parent) = parent {
				self.append_effects_to_parent(parent, completed)?;
			}
			if sibling.is_some() {
				return self.set_next(sibling);
			}
			match parent {
				Some(parent) => completed = parent,
				None => return self.set_next(None),
			}
		}
	}

	fn complete_work(&mut self, id: UnitId) -> Result<()> {
		let unit = self.arena.get(id)?;
		let mut flags = Flags::empty();
		match unit.tag {
			UnitTag::Host | UnitTag::Text => {
				if let Some(current) = unit.alternate {
					let current = self.arena.get(current)?;
					let changed = match (&current.memoized, &unit.element) {
						(Some(old), Some(new)) => !old.same(new) && (old.props() != new.props() || old.as_text() != new.as_text()),
						_ => false,
					};
					if changed && current.host_node.is_some() {
						flags |= Flags::UPDATE;
					}
				}
			}
			UnitTag::Boundary if !unit.retry_resources.is_empty() => flags |= Flags::RETRY,
			_ => {}
		}

		let unit = self.arena.get_mut(id)?;
		unit.flags |= flags;
		unit.memoized = unit.element.clone();
		self.bubble(id)
	}

	/// Recomputes `child_lanes` and re-points every child at this unit.
	fn bubble(&mut self, id: UnitId) -> Result<()> {
		let mut child_lanes = Lanes::empty();
		let mut cursor = self.arena.get(id)?.child;
		while let Some(child) = cursor {
			let unit = self.arena.get_mut(child)?;
			child_lanes |= unit.lanes | unit.child_lanes;
			unit.parent = Some(id);
			cursor = unit.sibling;
		}
		self.arena.get_mut(id)?.child_lanes = child_lanes;
		Ok(())
	}

	/// Moves the child's effect list, then the child itself, onto the parent.
	fn append_effects_to_parent(&mut self, parent: UnitId, child: UnitId) -> Result<()> {
		let unit = self.arena.get(child)?;
		let (first, last, has_effects) = (unit.first_effect, unit.last_effect, unit.has_effects());
		if let (Some(first), Some(last)) = (first, last) {
			match self.arena.get(parent)?.last_effect {
				Some(tail) => self.arena.get_mut(tail)?.next_effect = Some(first),
				None => self.arena.get_mut(parent)?.first_effect = Some(first),
			}
			self.arena.get_mut(parent)?.last_effect = Some(last);
		}
		if has_effects {
			self.append_effect(parent, child)?;
		}
		Ok(())
	}
}
