//! Error types and handling for ferrosync
//!
//! Errors are split by how far they are allowed to travel. Admission timeouts,
//! scan failures and configuration problems abort a whole synchronization run;
//! everything raised while handling a single file is absorbed by the worker
//! that hit it and only shows up in the log.

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - the affected file is skipped
    Low,
    /// Medium severity - the affected unit of work is skipped
    Medium,
    /// High severity - the run cannot start
    High,
    /// Critical severity - the run must be aborted
    Critical,
}

/// Main error type for ferrosync operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Local I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// A path expected to exist does not
    #[error("Not found: {path}")]
    NotFound {
        /// Path that was not found
        path: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The transfer protocol rejected an operation
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Protocol reply code
        code: u16,
        /// Server supplied message
        message: String,
    },

    /// Enumerating one of the trees failed
    #[error("Failed to scan '{root}': {message}")]
    Scan {
        /// Root of the tree being scanned
        root: String,
        /// Cause of the failure
        message: String,
    },

    /// Operation timed out
    #[error("{operation} timed out after {millis} ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Timeout that elapsed, in milliseconds
        millis: u64,
    },

    /// Synchronization error
    #[error("Synchronization error: {message}")]
    Sync {
        /// Error message describing the synchronization issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Configuration errors
    Config,
    /// Transfer protocol errors
    Protocol,
    /// Tree enumeration errors
    Scan,
    /// Timeout
    Timeout,
    /// Synchronization errors
    Sync,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::NotFound { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Scan { .. } => ErrorKind::Scan,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Sync { .. } => ErrorKind::Sync,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } | Self::NotFound { .. } | Self::Protocol { .. } => ErrorSeverity::Low,
            Self::Sync { .. } | Self::Other { .. } => ErrorSeverity::Medium,
            Self::Config { .. } | Self::Scan { .. } => ErrorSeverity::High,
            Self::Timeout { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether this error must abort the whole synchronization run
    pub fn is_fatal(&self) -> bool {
        self.severity() >= ErrorSeverity::High
    }

    /// Protocol reply code, when the error came from the transfer protocol
    pub fn protocol_code(&self) -> Option<u16> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(code: u16, message: S) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Create a new scan error
    pub fn scan<R: Into<String>, S: Into<String>>(root: R, message: S) -> Self {
        Self::Scan {
            root: root.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a new sync error
    pub fn sync<S: Into<String>>(message: S) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
