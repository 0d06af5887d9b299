//! Slab storage for work units with generation-checked handles.

use slab::Slab;

use crate::error::InvariantViolation;
use crate::unit::{Identity, Unit};

/// Handle to a unit slot.
///
/// Carries the slot generation at allocation time; using a handle after its
/// unit was freed yields [`InvariantViolation::StaleUnit`] instead of
/// aliasing whatever reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId {
	index: usize,
	generation: u32,
}

pub(crate) struct Arena<N> {
	units: Slab<Unit<N>>,
	generations: Vec<u32>,
	next_identity: u64,
}

impl<N> Default for Arena<N> {
	fn default() -> Self {
		Self {
			units: Slab::new(),
			generations: Vec::new(),
			next_identity: 0,
		}
	}
}

impl<N> Arena<N> {
	pub(crate) fn next_identity(&mut self) -> Identity {
		self.next_identity += 1;
		Identity(self.next_identity)
	}

	pub(crate) fn insert(&mut self, unit: Unit<N>) -> UnitId {
		let entry = self.units.vacant_entry();
		let index = entry.key();
		entry.insert(unit);
		if self.generations.len() <= index {
			self.generations.resize(index + 1, 0);
		}
		UnitId {
			index,
			generation: self.generations[index],
		}
	}

	pub(crate) fn contains(&self, id: UnitId) -> bool {
		self.generations.get(id.index) == Some(&id.generation) && self.units.contains(id.index)
	}

	pub(crate) fn get(&self, id: UnitId) -> Result<&Unit<N>, InvariantViolation> {
		if !self.contains(id) {
			return Err(InvariantViolation::StaleUnit(id));
		}
		self.units.get(id.index).ok_or(InvariantViolation::StaleUnit(id))
	}

	pub(crate) fn get_mut(&mut self, id: UnitId) -> Result<&mut Unit<N>, InvariantViolation> {
		if !self.contains(id) {
			return Err(InvariantViolation::StaleUnit(id));
		}
		self.units.get_mut(id.index).ok_or(InvariantViolation::StaleUnit(id))
	}

	/// Frees a slot. Returns `None` for stale handles.
	pub(crate) fn remove(&mut self, id: UnitId) -> Option<Unit<N>> {
		if !self.contains(id) {
			return None;
		}
		self.generations[id.index] = self.generations[id.index].wrapping_add(1);
		self.units.try_remove(id.index)
	}

	pub(crate) fn len(&self) -> usize {
		self.units.len()
	}
}
