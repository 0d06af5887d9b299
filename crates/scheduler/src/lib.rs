//! Cooperative priority scheduler.
//!
//! [`Scheduler`] owns a min-heap of pending callbacks ordered by expiration
//! time and insertion order, plus the host yield controller that decides when
//! a running callback must hand control back to the host. Nothing here knows
//! about trees; the reconciler drives it through [`Scheduler::schedule`] and
//! [`Scheduler::should_yield`].
//!
//! All state lives behind one explicit [`Scheduler`] handle. Independent
//! handles never share state, so tests and separate hosts stay isolated.

/// Monotonic time sources.
pub mod clock;
/// Scheduler configuration.
pub mod config;
/// Error types.
pub mod error;
/// Priority levels and their timeouts.
pub mod priority;
/// Profiling event log.
pub mod profiling;
/// Cross-thread wake hand-off into the cooperative queue.
pub mod remote;
mod queue;
mod scheduler;
mod yield_controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PriorityTimeouts, SchedulerConfig};
pub use error::{FlushError, SchedulerError, TaskError};
pub use priority::Priority;
pub use profiling::{ProfilingEvent, ProfilingEventKind};
pub use remote::{RemoteWaker, WakeHookId};
pub use scheduler::{Callback, DrainOutcome, FlushOutcome, Scheduler, TaskHandle, TaskId, TaskOutcome, TaskRun};
pub use yield_controller::HostSignals;
