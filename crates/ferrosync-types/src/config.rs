//! Configuration types for ferrosync
//!
//! Validated newtypes shared by the configuration layer, the admission
//! controller and the scheduler.

/// Width of the synchronization worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// Minimum worker count
    pub const MIN: usize = 1;
    /// Maximum worker count
    pub const MAX: usize = 64;
    /// Default worker count, the usual per-client session cap of FTP servers
    pub const DEFAULT: usize = 5;

    /// Create a new worker count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Worker count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Worker count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the worker count value
    pub fn get(self) -> usize {
        self.0
    }

    /// Number of workers worth spawning for `pending` units of work
    pub fn effective(self, pending: usize) -> usize {
        self.0.min(pending)
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for WorkerCount {
    type Error = String;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<WorkerCount> for usize {
    fn from(count: WorkerCount) -> Self {
        count.0
    }
}

/// Ceiling on concurrently open remote sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct ConnectionLimit(usize);

impl ConnectionLimit {
    /// Default ceiling
    pub const DEFAULT: usize = 50;

    /// Create a new connection limit with validation
    pub fn new(limit: usize) -> Result<Self, String> {
        if limit == 0 {
            Err("Connection limit must be greater than 0".to_string())
        } else {
            Ok(Self(limit))
        }
    }

    /// Get the limit value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ConnectionLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for ConnectionLimit {
    type Error = String;

    fn try_from(limit: usize) -> Result<Self, Self::Error> {
        Self::new(limit)
    }
}

impl From<ConnectionLimit> for usize {
    fn from(limit: ConnectionLimit) -> Self {
        limit.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_validation() {
        assert!(WorkerCount::new(0).is_err());
        assert!(WorkerCount::new(65).is_err());
        assert_eq!(WorkerCount::new(8).unwrap().get(), 8);
        assert_eq!(WorkerCount::default().get(), 5);
    }

    #[test]
    fn test_effective_worker_count() {
        let workers = WorkerCount::default();
        assert_eq!(workers.effective(2), 2);
        assert_eq!(workers.effective(0), 0);
        assert_eq!(workers.effective(100), 5);
    }

    #[test]
    fn test_connection_limit() {
        assert!(ConnectionLimit::new(0).is_err());
        assert_eq!(ConnectionLimit::default().get(), 50);
    }

    #[test]
    fn test_conversions_go_through_validation() {
        assert!(WorkerCount::try_from(0).is_err());
        assert!(WorkerCount::try_from(WorkerCount::MAX + 1).is_err());
        assert!(ConnectionLimit::try_from(0).is_err());
        assert_eq!(usize::from(WorkerCount::try_from(3).unwrap()), 3);
        assert_eq!(usize::from(ConnectionLimit::try_from(7).unwrap()), 7);
    }
}
