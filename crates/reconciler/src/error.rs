//! Error types for the reconciler.

use std::sync::Arc;

use thiserror::Error;

use crate::arena::UnitId;

/// Errors surfaced by render and commit.
#[derive(Debug, Error)]
pub enum ReconcileError {
	/// A component failed and no catch boundary above it handled the error.
	#[error("uncaught render error: {0}")]
	Render(#[source] RenderError),

	/// The host rejected a mutation during commit.
	///
	/// Mutations applied before the failing one stay applied; the finished
	/// tree is dropped and its lanes remain pending.
	#[error("host mutation failed during commit: {0}")]
	Host(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

	/// Internal bookkeeping is corrupted; the render pass was abandoned.
	#[error(transparent)]
	Invariant(#[from] InvariantViolation),

	/// Commit callbacks kept scheduling sync updates.
	#[error("maximum update depth exceeded: more than {limit} nested sync commits")]
	UpdateDepthExceeded {
		/// Configured nesting limit.
		limit: u32,
	},
}

impl ReconcileError {
	pub(crate) fn host<E>(error: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Self::Host(Box::new(error))
	}
}

/// Programming defects detected while reconciling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
	/// A unit handle outlived its slot.
	#[error("stale unit handle {0:?}")]
	StaleUnit(UnitId),

	/// The work loop lost its render state mid-pass.
	#[error("render state missing while work is in progress")]
	MissingRenderState,

	/// The root was updated from inside its own render or commit.
	#[error("root re-entered during render or commit")]
	Reentrant,

	/// A unit being placed has no host ancestor to attach to.
	#[error("unit {0:?} has no host parent")]
	DetachedUnit(UnitId),

	/// A render was started for lanes the root has no pending work in.
	#[error("render selected lanes {0:#x} that are not pending")]
	LanesNotPending(u32),
}

/// Error raised by a component while rendering.
///
/// Cheap to clone; the same error value is passed to the catch boundary's
/// fallback and reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
	message: Arc<str>,
}

impl RenderError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: Arc::from(message.into()),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or types.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A field parsed but holds an unusable value.
	#[error("invalid value for {field}: {reason}")]
	InvalidValue {
		/// Name of the offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},
}

/// Result type for reconciler operations.
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
