//! ferrosync Testing Suite
//!
//! This crate provides end-to-end integration tests and benchmarks for
//! ferrosync, plus the fixtures they share.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Concurrency testing utilities
///
/// Connectors that observe how many sessions a run keeps open.
pub mod concurrency_utils;

/// Unified test utilities
///
/// Temporary local and mounted trees with fixed timestamps.
pub mod test_utils;

pub use concurrency_utils::{CountingConnector, SessionMetrics};
pub use test_utils::{at, SyncFixture, REMOTE_ROOT};
