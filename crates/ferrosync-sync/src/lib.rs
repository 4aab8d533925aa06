//! One-way tree synchronization for ferrosync
//!
//! This crate mirrors a local tree to a remote one (push) or the other way
//! around (pull):
//!
//! - **Tree scanning**: both trees are listed concurrently into flat file lists,
//!   skipping ignored names together with their subtrees
//! - **Diff planning**: files are matched by their path relative to each root
//!   and classified as new, identical, conflicting, stale or obsolete
//! - **Bounded execution**: a small worker pool claims one unit at a time,
//!   each under a connection lease from the admission controller
//! - **Move semantics**: sources can be deleted once transferred
//! - **Progress reporting**: one status event per unit, plus a final report
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrosync_config::Config;
//! use ferrosync_network::MountedConnector;
//! use ferrosync_sync::SyncClient;
//! use ferrosync_types::SyncOptions;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = Arc::new(MountedConnector::new("/mnt/ftp"));
//! let client = SyncClient::new(connector, &Config::default())?;
//! let report = client.sync("./public", "/www", SyncOptions::push()).await?;
//! println!("Uploaded {} files, replaced {}", report.uploaded, report.replaced);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod executor;
pub mod planner;
pub mod progress;
pub mod scanner;
pub mod scheduler;

pub use engine::SyncClient;
pub use executor::TransferExecutor;
pub use planner::{classify, estimate_units, Classification, DiffPlanner, SyncQueues, SyncSide, WorkUnit};
pub use progress::{ProgressEvent, ProgressReporter, SyncPhase, SyncReport};
pub use scanner::{DirectoryLister, IgnoreMatcher, ListedEntry, LocalLister, RemoteLister, TreeScanner};
pub use scheduler::{SchedulerConfig, SyncScheduler};
