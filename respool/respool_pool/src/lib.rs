#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # respool pool
//!
//! Capacity-bounded pools for resources that are expensive to build.
//!
//! - [`Pool`] owns a fixed number of slots and a factory. Resources are built
//!   on first use, handed out as [`Handle`]s, and reused last-in first-out.
//!   Waiting for a free slot and retrying a failing factory both use a fixed
//!   delay and attempt bound.
//! - [`Handle`] is the borrow token; it can return or retire itself through
//!   its owning pool.
//! - [`Group`] registers pools by name and borrows from several of them for
//!   a single callback, releasing in reverse order.

/// Named registry of pools and multi-pool borrowing
pub mod group;

/// Borrow tokens
pub mod handle;

/// The pool itself
pub mod pool;

/// Idle slot representation
pub mod slot;

/// Statistics and telemetry
pub mod stats;

pub use group::Group;
pub use handle::Handle;
pub use pool::Pool;
pub use slot::Slot;
pub use stats::{PoolEvent, PoolStats, TelemetryHook};

pub use respool_core::{PoolError, Result};
