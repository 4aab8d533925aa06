//! Result type alias for ferrosync operations

use crate::Error;

/// Result type alias for ferrosync operations
pub type Result<T> = std::result::Result<T, Error>;
