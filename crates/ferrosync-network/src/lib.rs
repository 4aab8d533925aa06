//! Remote session plumbing for ferrosync
//!
//! This crate provides everything the sync engine needs to talk to the
//! remote side:
//!
//! - **Admission control**: a FIFO-fair counting semaphore bounding how many
//!   sessions are open at once, with a per-request timeout
//! - **Session capability**: the [`RemoteSession`] and [`Connector`] traits a
//!   transfer-protocol client implements
//! - **Mounted backend**: a [`Connector`] serving a local directory as the
//!   server's file system
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_network::{AdmissionController, Connector, Credentials, MountedConnector};
//! use ferrosync_types::ConnectionLimit;
//! use std::time::Duration;
//!
//! # async fn example() -> ferrosync_types::Result<()> {
//! let admission = AdmissionController::shared(ConnectionLimit::default());
//! let lease = admission.acquire(Duration::from_secs(30)).await?;
//!
//! let connector = MountedConnector::new("/mnt/ftp");
//! let mut session = connector.connect(&Credentials::default()).await?;
//! let entries = session.list("/").await?;
//! println!("{} entries", entries.len());
//! session.close().await?;
//! drop(lease);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod admission;
pub mod mounted;
pub mod session;

pub use admission::{AdmissionController, ConnectionLease, DEFAULT_ACQUIRE_TIMEOUT};
pub use mounted::{MountedConnector, MountedSession};
pub use session::{
    Connector, Credentials, RemoteEntry, RemoteSession, CODE_LOCAL_ERROR, CODE_NOT_ALLOWED,
    CODE_NOT_AVAILABLE, CODE_NOT_FOUND,
};
