//! In-memory host for the reconciler.
//!
//! [`NoopHost`] keeps a plain node tree, logs every mutation it receives and
//! can be told to fail a mutation on demand. Tests drive a
//! [`weft_reconciler::Root`] against it and compare [`NoopHost::render`]
//! snapshots.

pub use error::NoopError;
pub use host::{Mutation, NodeId, NoopHost};

mod error;
mod host;
