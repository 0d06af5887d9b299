use thiserror::Error;

use crate::host::NodeId;

/// Mutation rejected by [`crate::NoopHost`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoopError {
	/// Failure requested through [`crate::NoopHost::fail_after`].
	#[error("injected failure in {operation}")]
	Injected {
		/// Host method that failed.
		operation: &'static str,
	},

	/// The node handle was never created by this host.
	#[error("unknown node {0}")]
	UnknownNode(NodeId),

	/// Removal or insertion referenced a child the parent does not hold.
	#[error("{child} is not a child of {parent}")]
	NotAChild {
		/// Expected parent.
		parent: NodeId,
		/// Node that was looked up.
		child: NodeId,
	},

	/// Text operations on an element, or props operations on text.
	#[error("{node} is not a {expected} node")]
	WrongKind {
		/// Node the operation was applied to.
		node: NodeId,
		/// Kind the operation needs.
		expected: &'static str,
	},
}
