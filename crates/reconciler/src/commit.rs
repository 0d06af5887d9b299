//! Commit phase.
//!
//! Applies a finished tree's effect list to the host in one uninterrupted
//! pass, then swaps the finished tree in as the committed one.
//!
//! # Ordering
//!
//! Effects run in list order: a parent's deletions come first, followed by
//! its children's effects in post-order. Within one effect, deletion
//! excludes everything else; placement precedes update.
//!
//! # Failure
//!
//! A host error stops the pass. Mutations already applied stay applied, the
//! finished tree is dropped and the committed tree is left as it was, so the
//! lanes stay pending for the next explicit update.

use std::time::Duration;

use smallvec::SmallVec;

use crate::arena::UnitId;
use crate::boundary::Ping;
use crate::element::ElementKind;
use crate::error::{InvariantViolation, ReconcileError, Result};
use crate::host::Host;
use crate::lane::Lanes;
use crate::unit::{Flags, UnitTag};
use crate::update_queue::CommitCallback;
use crate::work_loop::{RootPhase, RootState};

/// What a successful commit hands back to the root driver.
pub(crate) struct CommitReport {
	pub(crate) lanes: Lanes,
	pub(crate) callbacks: Vec<CommitCallback>,
}

/// Result of [`crate::Root::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
	/// A finished tree for these lanes was committed.
	Committed(Lanes),
	/// There was no finished tree.
	NothingToCommit,
}

impl<N: Clone> RootState<N> {
	/// Commits the finished tree, if any.
	pub(crate) fn commit_root<H>(&mut self, host: &mut H, now: Duration) -> Result<Option<CommitReport>>
	where
		H: Host<Node = N>,
	{
		let Some(finished) = self.finished.take() else {
			return Ok(None);
		};
		let lanes = finished.lanes;
		self.phase = RootPhase::Committing;
		let _span = tracing::debug_span!("commit", lanes = ?lanes).entered();

		let effects = self.take_effects(finished.root)?;
		let mut deleted = Vec::new();
		if let Err(error) = self.apply_mutations(host, &effects, &mut deleted) {
			tracing::warn!(error = %error, "commit.host_failed");
			self.discard_finished(finished);
			self.phase = RootPhase::Idle;
			return Err(error);
		}
		for unit in deleted {
			self.free_subtree(unit)?;
		}

		self.current = finished.root;
		let root = self.arena.get(finished.root)?;
		let mut remaining = root.lanes | root.child_lanes | finished.interleaved;
		let mut callbacks = Vec::new();
		match finished.update {
			Some(update) => {
				remaining |= self.queue.lanes_after(&update);
				callbacks.clone_from(&update.callbacks);
				self.queue.commit(update);
			}
			None => remaining |= self.queue.lanes(),
		}
		self.lanes.mark_finished(remaining);

		self.register_retries(&effects);
		self.advance_hydration_targets()?;
		self.profiles.push(finished.timer.finish(lanes, now));
		self.restarts = 0;
		self.phase = RootPhase::Idle;
		tracing::debug!(lanes = ?lanes, remaining = ?remaining, effects = effects.len(), "commit.done");
		Ok(Some(CommitReport { lanes, callbacks }))
	}

	/// Unlinks the root's effect list into a vector.
	fn take_effects(&mut self, root: UnitId) -> Result<Vec<UnitId>> {
		let mut effects = Vec::new();
		let mut cursor = self.arena.get(root)?.first_effect;
		while let Some(id) = cursor {
			let unit = self.arena.get_mut(id)?;
			cursor = unit.next_effect.take();
			effects.push(id);
		}
		let root = self.arena.get_mut(root)?;
		root.first_effect = None;
		root.last_effect = None;
		Ok(effects)
	}

	fn apply_mutations<H>(&mut self, host: &mut H, effects: &[UnitId], deleted: &mut Vec<UnitId>) -> Result<()>
	where
		H: Host<Node = N>,
	{
		host.prepare_for_commit().map_err(ReconcileError::host)?;
		let applied = self.apply_effects(host, effects, deleted);
		let reset = host.reset_after_commit().map_err(ReconcileError::host);
		applied.and(reset)
	}

	fn apply_effects<H>(&mut self, host: &mut H, effects: &[UnitId], deleted: &mut Vec<UnitId>) -> Result<()>
	where
		H: Host<Node = N>,
	{
		for &id in effects {
			let flags = self.arena.get(id)?.flags;
			if flags.contains(Flags::DELETION) {
				self.commit_deletion(host, id)?;
				deleted.push(id);
				continue;
			}
			if flags.contains(Flags::PLACEMENT) {
				self.commit_placement(host, id)?;
			}
			if flags.contains(Flags::UPDATE) {
				self.commit_update(host, id)?;
			}
			self.arena.get_mut(id)?.flags.remove(Flags::PLACEMENT | Flags::UPDATE);
		}
		Ok(())
	}

	fn commit_deletion<H>(&mut self, host: &mut H, id: UnitId) -> Result<()>
	where
		H: Host<Node = N>,
	{
		tracing::trace!(unit = ?id, "commit.delete");
		match self.host_parent_node(id)? {
			Some(parent) => self.remove_host_nodes(host, id, &parent),
			None => Ok(()),
		}
	}

	/// Removes the topmost host nodes under `id`; their descendants go with them.
	fn remove_host_nodes<H>(&self, host: &mut H, id: UnitId, parent: &N) -> Result<()>
	where
		H: Host<Node = N>,
	{
		let unit = self.arena.get(id)?;
		if unit.tag.is_host() {
			if let Some(node) = &unit.host_node {
				host.remove_node(parent, node).map_err(ReconcileError::host)?;
			}
			return Ok(());
		}
		let mut cursor = unit.child;
		while let Some(child) = cursor {
			self.remove_host_nodes(host, child, parent)?;
			cursor = self.arena.get(child)?.sibling;
		}
		Ok(())
	}

	fn commit_placement<H>(&mut self, host: &mut H, id: UnitId) -> Result<()>
	where
		H: Host<Node = N>,
	{
		tracing::trace!(unit = ?id, "commit.place");
		let parent = self.host_parent_node(id)?.ok_or(InvariantViolation::DetachedUnit(id))?;
		let before = self.host_sibling(id)?;
		self.insert_host_nodes(host, id, &parent, before.as_ref())
	}

	/// Inserts the topmost host nodes under `id`, creating any that do not
	/// exist yet.
	fn insert_host_nodes<H>(&mut self, host: &mut H, id: UnitId, parent: &N, before: Option<&N>) -> Result<()>
	where
		H: Host<Node = N>,
	{
		let unit = self.arena.get(id)?;
		let (is_host, existing, mut cursor) = (unit.tag.is_host(), unit.host_node.clone(), unit.child);
		if is_host {
			let node = match existing {
				Some(node) => node,
				None => self.create_host_subtree(host, id)?,
			};
			let inserted = match before {
				Some(before) => host.insert_before(parent, &node, before),
				None => host.append_child(parent, &node),
			};
			return inserted.map_err(ReconcileError::host);
		}
		while let Some(child) = cursor {
			self.insert_host_nodes(host, child, parent, before)?;
			cursor = self.arena.get(child)?.sibling;
		}
		Ok(())
	}

	/// Creates the host node for a host unit and appends its whole subtree.
	fn create_host_subtree<H>(&mut self, host: &mut H, id: UnitId) -> Result<N>
	where
		H: Host<Node = N>,
	{
		let element = self.arena.get(id)?.memoized.clone().ok_or(InvariantViolation::DetachedUnit(id))?;
		let created = match element.kind() {
			ElementKind::Host { tag, props, .. } => host.create_node(tag, props),
			ElementKind::Text(text) => host.create_text(text),
			_ => return Err(InvariantViolation::DetachedUnit(id).into()),
		};
		let node = created.map_err(ReconcileError::host)?;
		let unit = self.arena.get_mut(id)?;
		unit.host_node = Some(node.clone());
		let mut cursor = unit.child;
		while let Some(child) = cursor {
			self.insert_host_nodes(host, child, &node, None)?;
			cursor = self.arena.get(child)?.sibling;
		}
		Ok(node)
	}

	fn commit_update<H>(&self, host: &mut H, id: UnitId) -> Result<()>
	where
		H: Host<Node = N>,
	{
		let unit = self.arena.get(id)?;
		let (Some(node), Some(new)) = (&unit.host_node, &unit.memoized) else {
			return Ok(());
		};
		let old = match unit.alternate {
			Some(current) => self.arena.get(current)?.memoized.clone(),
			None => None,
		};
		let Some(old) = old else {
			return Ok(());
		};
		tracing::trace!(unit = ?id, "commit.update");
		let updated = match (old.kind(), new.kind()) {
			(ElementKind::Host { props: old, .. }, ElementKind::Host { props: new, .. }) => host.update_node(node, old, new),
			(ElementKind::Text(old), ElementKind::Text(new)) => host.update_text(node, old, new),
			_ => Ok(()),
		};
		updated.map_err(ReconcileError::host)
	}

	/// Host node of the nearest ancestor that can hold host children.
	fn host_parent_node(&self, id: UnitId) -> Result<Option<N>> {
		let mut cursor = self.arena.get(id)?.parent;
		while let Some(ancestor) = cursor {
			let unit = self.arena.get(ancestor)?;
			if unit.tag.is_host_parent() {
				return Ok(unit.host_node.clone());
			}
			cursor = unit.parent;
		}
		Ok(None)
	}

	/// First host node after `id` among its siblings' subtrees that is
	/// already in place, or `None` to append.
	fn host_sibling(&self, id: UnitId) -> Result<Option<N>> {
		let mut node = id;
		'siblings: loop {
			loop {
				let unit = self.arena.get(node)?;
				if let Some(sibling) = unit.sibling {
					node = sibling;
					break;
				}
				match unit.parent {
					Some(parent) if !self.arena.get(parent)?.tag.is_host_parent() => node = parent,
					_ => return Ok(None),
				}
			}
			loop {
				let unit = self.arena.get(node)?;
				if unit.flags.contains(Flags::PLACEMENT) {
					continue 'siblings;
				}
				if unit.tag.is_host() {
					match &unit.host_node {
						Some(host_node) => return Ok(Some(host_node.clone())),
						None => continue 'siblings,
					}
				}
				match unit.child {
					Some(child) => node = child,
					None => continue 'siblings,
				}
			}
		}
	}

	/// Frees a deleted subtree and the alternates of its units.
	fn free_subtree(&mut self, id: UnitId) -> Result<()> {
		let mut stack: SmallVec<[UnitId; 16]> = self.arena.get(id)?.child.into_iter().collect();
		let mut doomed = vec![id];
		while let Some(next) = stack.pop() {
			let Ok(unit) = self.arena.get(next) else {
				continue;
			};
			stack.extend(unit.sibling);
			stack.extend(unit.child);
			doomed.push(next);
		}
		for id in doomed {
			let Some(unit) = self.arena.remove(id) else {
				continue;
			};
			if unit.tag == UnitTag::Boundary {
				self.registry.forget(unit.identity);
			}
			if let Some(alternate) = unit.alternate {
				self.arena.remove(alternate);
			}
		}
		Ok(())
	}

	/// Subscribes to every resource a committed boundary is waiting on.
	fn register_retries(&mut self, effects: &[UnitId]) {
		for &id in effects {
			let Ok(unit) = self.arena.get_mut(id) else {
				continue;
			};
			if !unit.flags.contains(Flags::RETRY) {
				continue;
			}
			unit.flags.remove(Flags::RETRY);
			let resources = std::mem::take(&mut unit.retry_resources);
			let (identity, lane) = (unit.identity, unit.boundary.retry_lane);
			for resource in resources {
				let resource_id = resource.id();
				if self.registry.register(identity, lane, resource_id) {
					tracing::debug!(resource = %resource_id, lane = ?lane, "commit.retry_registered");
					resource.then(self.pinger.listener(Ping::Retry {
						boundary: identity,
						resource: resource_id,
					}));
				}
			}
		}
	}

	/// Drops hydration targets that are gone or hydrated and boosts the new
	/// front target.
	pub(crate) fn advance_hydration_targets(&mut self) -> Result<()> {
		while let Some(target) = self.hydration.front() {
			match self.find_current_by_identity(target.boundary)? {
				Some(unit) if self.arena.get(unit)?.boundary.dehydrated => {
					if !target.boosted {
						tracing::debug!(unit = ?unit, lane = ?target.lane, "hydration.boost");
						self.mark_path(unit, target.lane)?;
						self.mark_root_updated(target.lane);
						self.hydration.mark_front_boosted();
					}
					return Ok(());
				}
				_ => {
					self.hydration.pop_front();
				}
			}
		}
		Ok(())
	}
}
