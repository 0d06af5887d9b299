//! Child reconciliation.
//!
//! New children are matched against the committed ones by key, falling back
//! to position for unkeyed children. A match of the same type reuses the old
//! unit's alternate; everything else is a fresh mount. Old children left
//! unmatched are deleted. Deletions go on the parent's effect list as soon as
//! they are found, ahead of any effect the new children produce.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::arena::UnitId;
use crate::element::{Element, Key};
use crate::error::Result;
use crate::unit::{Flags, Unit, UnitTag};
use crate::work_loop::RootState;

#[derive(Debug, PartialEq, Eq, Hash)]
enum ChildKey {
	Keyed(Key),
	Index(usize),
}

impl ChildKey {
	fn new(key: Option<&Key>, index: usize) -> Self {
		match key {
			Some(key) => Self::Keyed(Rc::clone(key)),
			None => Self::Index(index),
		}
	}
}

impl<N: Clone> RootState<N> {
	pub(crate) fn reconcile_children(&mut self, parent: UnitId, elements: Vec<Element>) -> Result<()> {
		let current = self.arena.get(parent)?.alternate;
		// Fresh subtrees are inserted whole by their topmost placement.
		let track = current.is_some();

		let mut existing: FxHashMap<ChildKey, UnitId> = FxHashMap::default();
		let mut order: SmallVec<[UnitId; 8]> = SmallVec::new();
		if let Some(current) = current {
			let mut cursor = self.arena.get(current)?.child;
			while let Some(child) = cursor {
				let unit = self.arena.get(child)?;
				existing.insert(ChildKey::new(unit.key.as_ref(), unit.index), child);
				order.push(child);
				cursor = unit.sibling;
			}
		}

		let mut handled: FxHashSet<UnitId> = FxHashSet::default();
		let mut last_placed = 0;
		let mut first = None;
		let mut previous: Option<UnitId> = None;
		for (index, element) in elements.into_iter().enumerate() {
			let matched = existing.remove(&ChildKey::new(element.key(), index));
			handled.extend(matched);
			let reusable = match matched {
				Some(old) => self.arena.get(old)?.memoized.as_ref().is_some_and(|memoized| memoized.same_type(&element)),
				None => false,
			};
			let child = match matched {
				Some(old) if reusable => {
					let old_index = self.arena.get(old)?.index;
					let child = self.create_work_in_progress(old, Some(element))?;
					if track {
						if old_index < last_placed {
							self.arena.get_mut(child)?.flags |= Flags::PLACEMENT;
						} else {
							last_placed = old_index;
						}
					}
					child
				}
				stale => {
					if let Some(old) = stale {
						self.delete_child(parent, old)?;
					}
					let child = self.create_fresh(element)?;
					if track {
						self.arena.get_mut(child)?.flags |= Flags::PLACEMENT;
					}
					child
				}
			};

			let unit = self.arena.get_mut(child)?;
			unit.index = index;
			unit.parent = Some(parent);
			unit.sibling = None;
			match previous {
				Some(previous) => self.arena.get_mut(previous)?.sibling = Some(child),
				None => first = Some(child),
			}
			previous = Some(child);
		}

		for old in order.into_iter().filter(|old| !handled.contains(old)) {
			self.delete_child(parent, old)?;
		}
		self.arena.get_mut(parent)?.child = first;
		Ok(())
	}

	/// Clones the committed children of a bailed-out unit.
	pub(crate) fn clone_children(&mut self, parent: UnitId) -> Result<()> {
		let mut cursor = self.arena.get(parent)?.child;
		let mut previous: Option<UnitId> = None;
		while let Some(current) = cursor {
			let source = self.arena.get(current)?;
			let (element, next) = (source.memoized.clone(), source.sibling);
			let child = self.create_work_in_progress(current, element)?;
			let unit = self.arena.get_mut(child)?;
			unit.parent = Some(parent);
			unit.sibling = None;
			match previous {
				Some(previous) => self.arena.get_mut(previous)?.sibling = Some(child),
				None => self.arena.get_mut(parent)?.child = Some(child),
			}
			previous = Some(child);
			cursor = next;
		}
		Ok(())
	}

	/// Pairs a committed unit with a work-in-progress copy, reusing its
	/// alternate when one is still allocated.
	pub(crate) fn create_work_in_progress(&mut self, current: UnitId, element: Option<Element>) -> Result<UnitId> {
		let source = self.arena.get(current)?;
		let (identity, tag, key) = (source.identity, source.tag, source.key.clone());
		let memoized = source.memoized.clone();
		let (parent, child, sibling, index) = (source.parent, source.child, source.sibling, source.index);
		let (lanes, child_lanes, boundary) = (source.lanes, source.child_lanes, source.boundary);
		let host_node = source.host_node.clone();
		let reusable = source.alternate.filter(|alternate| self.arena.contains(*alternate));

		let id = match reusable {
			Some(alternate) => alternate,
			None => {
				let mut unit = Unit::new(identity, tag, key, None);
				unit.alternate = Some(current);
				let id = self.arena.insert(unit);
				self.arena.get_mut(current)?.alternate = Some(id);
				id
			}
		};
		let unit = self.arena.get_mut(id)?;
		unit.element = element;
		unit.memoized = memoized;
		unit.parent = parent;
		unit.child = child;
		unit.sibling = sibling;
		unit.index = index;
		unit.lanes = lanes;
		unit.child_lanes = child_lanes;
		unit.host_node = host_node;
		unit.boundary = boundary;
		unit.flags = Flags::empty();
		unit.next_effect = None;
		unit.first_effect = None;
		unit.last_effect = None;
		unit.captured_error = None;
		unit.retry_resources.clear();
		Ok(id)
	}

	fn create_fresh(&mut self, element: Element) -> Result<UnitId> {
		let identity = self.arena.next_identity();
		let tag = UnitTag::of(&element);
		let key = element.key().cloned();
		let id = self.arena.insert(Unit::new(identity, tag, key, Some(element)));
		self.render_mut()?.fresh.insert(id);
		Ok(id)
	}

	fn delete_child(&mut self, parent: UnitId, old: UnitId) -> Result<()> {
		let unit = self.arena.get_mut(old)?;
		unit.flags = Flags::DELETION;
		unit.next_effect = None;
		tracing::trace!(unit = ?old, "render.delete");
		self.append_effect(parent, old)
	}

	/// Appends `unit` itself to `parent`'s effect list.
	pub(crate) fn append_effect(&mut self, parent: UnitId, unit: UnitId) -> Result<()> {
		match self.arena.get(parent)?.last_effect {
			Some(last) => self.arena.get_mut(last)?.next_effect = Some(unit),
			None => self.arena.get_mut(parent)?.first_effect = Some(unit),
		}
		self.arena.get_mut(parent)?.last_effect = Some(unit);
		Ok(())
	}
}
