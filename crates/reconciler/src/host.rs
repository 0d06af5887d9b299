//! Host tree adapter.
//!
//! The reconciler never touches host nodes outside of commit. Every method
//! here is called from [`crate::Root`] while a commit is in progress, in
//! effect-list order, and every failure aborts that commit.

use std::fmt::Debug;

use crate::element::Props;

/// Mutable host tree the reconciler commits into.
pub trait Host {
	/// Handle to one host node. Cloned into every unit that owns it.
	type Node: Clone + Debug;
	/// Mutation failure reported back through [`crate::ReconcileError::Host`].
	type Error: std::error::Error + Send + Sync + 'static;

	/// Creates a detached element node.
	fn create_node(&mut self, tag: &str, props: &Props) -> Result<Self::Node, Self::Error>;

	/// Creates a detached text node.
	fn create_text(&mut self, text: &str) -> Result<Self::Node, Self::Error>;

	fn update_node(&mut self, node: &Self::Node, old: &Props, new: &Props) -> Result<(), Self::Error>;

	fn update_text(&mut self, node: &Self::Node, old: &str, new: &str) -> Result<(), Self::Error>;

	/// Appends `child` as the last child of `parent`, moving it if already attached.
	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;

	/// Inserts `child` before `before`, moving it if already attached.
	fn insert_before(&mut self, parent: &Self::Node, child: &Self::Node, before: &Self::Node) -> Result<(), Self::Error>;

	fn remove_node(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;

	/// Called once before the first mutation of a commit.
	fn prepare_for_commit(&mut self) -> Result<(), Self::Error> {
		Ok(())
	}

	/// Called once after the last mutation of a commit.
	fn reset_after_commit(&mut self) -> Result<(), Self::Error> {
		Ok(())
	}
}
