//! Interruptible tree reconciliation.
//!
//! A [`Root`] keeps two buffers of a tree: the committed one mirrored in the
//! host, and a work-in-progress one built from new [`Element`]s. Updates are
//! tagged with priority [`Lanes`]; the root asks a
//! [`weft_scheduler::Scheduler`] to run render work at the priority of its
//! most urgent lane, yields between units when the scheduler says so, and
//! applies the finished tree to the [`Host`] in a single commit.
//!
//! Components may suspend on a [`Resource`]. The nearest boundary commits
//! its fallback and retries its content at a retry lane once the resource
//! resolves, from any thread.

mod arena;
mod begin;
mod boundary;
mod child;
mod commit;
mod complete;
/// Reconciler configuration.
pub mod config;
mod element;
/// Error types.
pub mod error;
/// Host tree adapter.
pub mod host;
/// Priority lanes.
pub mod lane;
mod profiler;
mod reflection;
mod resource;
mod root;
mod root_lanes;
mod unit;
mod unwind;
mod update_queue;
mod work_loop;

pub use arena::UnitId;
pub use commit::CommitOutcome;
pub use config::ReconcilerConfig;
pub use element::{CatchFallback, Component, Element, Key, Props, RenderContext, RenderSignal};
pub use error::{ConfigError, InvariantViolation, ReconcileError, RenderError, Result};
pub use host::Host;
pub use lane::{Lane, Lanes, TOTAL_LANES};
pub use profiler::RenderProfile;
pub use resource::{Resource, Wakeable, WakeableId};
pub use root::Root;
pub use root_lanes::RootLanes;
pub use unit::{BoundaryState, UnitTag};
pub use update_queue::{CommitCallback, Payload};
pub use work_loop::RootPhase;
