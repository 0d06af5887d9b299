//! Work units: one node of the current or in-progress tree.

use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::arena::UnitId;
use crate::element::{Element, ElementKind, Key};
use crate::error::RenderError;
use crate::lane::Lanes;
use crate::resource::Wakeable;

/// Stable identity shared by a unit and its alternate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Identity(pub(crate) u64);

/// Closed set of unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitTag {
	Root,
	Host,
	Text,
	Fragment,
	Component,
	Boundary,
	Catch,
}

impl UnitTag {
	pub(crate) fn of(element: &Element) -> Self {
		match element.kind() {
			ElementKind::Host { .. } => Self::Host,
			ElementKind::Text(_) => Self::Text,
			ElementKind::Fragment { .. } => Self::Fragment,
			ElementKind::Component(_) => Self::Component,
			ElementKind::Boundary { .. } => Self::Boundary,
			ElementKind::Catch { .. } => Self::Catch,
		}
	}

	/// Units that own a host node.
	pub fn is_host(self) -> bool {
		matches!(self, Self::Host | Self::Text)
	}

	/// Units whose host node can contain other host nodes.
	pub(crate) fn is_host_parent(self) -> bool {
		matches!(self, Self::Host | Self::Root)
	}
}

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub(crate) struct Flags: u16 {
		/// Insert (or move) the unit's host nodes.
		const PLACEMENT = 1 << 0;
		/// Apply changed props or text to the existing host node.
		const UPDATE = 1 << 1;
		/// Remove the unit's host nodes and free the subtree.
		const DELETION = 1 << 2;
		/// Boundary captured awaitables that need retry listeners.
		const RETRY = 1 << 3;
		/// Boundary or catch unit is re-rendering its fallback this pass.
		const DID_CAPTURE = 1 << 4;

		const EFFECTS = Self::PLACEMENT.bits() | Self::UPDATE.bits() | Self::DELETION.bits() | Self::RETRY.bits();
	}
}

/// Suspense state carried by boundary units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryState {
	/// Fallback is committed and the content has never rendered.
	pub dehydrated: bool,
	/// The committed children are the fallback.
	pub showing_fallback: bool,
	/// Lane the boundary re-renders at when its data arrives.
	pub retry_lane: Lanes,
}

pub(crate) struct Unit<N> {
	pub(crate) identity: Identity,
	pub(crate) tag: UnitTag,
	pub(crate) key: Option<Key>,
	/// Input for the next render.
	pub(crate) element: Option<Element>,
	/// Input of the last completed render.
	pub(crate) memoized: Option<Element>,

	pub(crate) parent: Option<UnitId>,
	pub(crate) child: Option<UnitId>,
	pub(crate) sibling: Option<UnitId>,
	pub(crate) index: usize,
	pub(crate) alternate: Option<UnitId>,

	pub(crate) lanes: Lanes,
	pub(crate) child_lanes: Lanes,
	pub(crate) flags: Flags,

	pub(crate) next_effect: Option<UnitId>,
	pub(crate) first_effect: Option<UnitId>,
	pub(crate) last_effect: Option<UnitId>,

	pub(crate) host_node: Option<N>,
	pub(crate) boundary: BoundaryState,
	pub(crate) captured_error: Option<RenderError>,
	pub(crate) retry_resources: SmallVec<[Arc<dyn Wakeable>; 1]>,
}

impl<N> Unit<N> {
	pub(crate) fn new(identity: Identity, tag: UnitTag, key: Option<Key>, element: Option<Element>) -> Self {
		Self {
			identity,
			tag,
			key,
			element,
			memoized: None,
			parent: None,
			child: None,
			sibling: None,
			index: 0,
			alternate: None,
			lanes: Lanes::empty(),
			child_lanes: Lanes::empty(),
			flags: Flags::empty(),
			next_effect: None,
			first_effect: None,
			last_effect: None,
			host_node: None,
			boundary: BoundaryState::default(),
			captured_error: None,
			retry_resources: SmallVec::new(),
		}
	}

	pub(crate) fn has_effects(&self) -> bool {
		self.flags.intersects(Flags::EFFECTS)
	}
}
