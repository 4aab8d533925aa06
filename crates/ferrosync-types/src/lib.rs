//! Core type system and error handling for ferrosync
//!
//! This crate provides the types shared by every ferrosync crate:
//!
//! - **Error handling**: one error enum with kinds, severities and a fatal/non-fatal split
//! - **Core types**: file entries, entry paths, synchronization options and statuses
//! - **Configuration**: validated newtypes for worker and connection limits
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_types::{EntryKind, FileEntry, SyncOptions};
//!
//! let entry = FileEntry::new("/srv/www/index.html", EntryKind::File, None);
//! assert_eq!(entry.path.resolve_common("/srv/www"), "/index.html");
//!
//! let options = SyncOptions::push().with_move();
//! assert!(options.is_move());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::{ConnectionLimit, WorkerCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use types::*;
