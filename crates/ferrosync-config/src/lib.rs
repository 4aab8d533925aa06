//! Configuration management system for ferrosync
//!
//! This crate loads the settings a [`SyncClient`](../ferrosync_sync/struct.SyncClient.html)
//! is constructed with: server credentials, ignore patterns, logging verbosity
//! and the connection admission limits.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: Type-safe configuration with validation after every load
//! - **Environment overrides**: `FERROSYNC_<SECTION>__<KEY>` variables, plus the
//!   legacy `FTP_MAX_CONNECTIONS` and `FTP_MAX_CONNECTIONS_PER_IP`
//! - **Defaults**: Sensible default values for all configuration options
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrosync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_source_file("ferrosync.yaml")
//!     .add_env_prefix("FERROSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Server: {}:{}", config.server.host, config.server.port);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrosync_types::{ConnectionLimit, WorkerCount};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for ferrosync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Remote server credentials
    pub server: ServerConfig,
    /// Synchronization behavior
    pub sync: SyncSettings,
    /// Connection admission limits
    pub connections: ConnectionSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check the invariants a loaded configuration must satisfy
    pub fn validate(&self) -> ConfigResult<()> {
        ConfigBuilder::validate(self)
    }
}

/// Remote server credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or address
    pub host: String,
    /// User name
    pub user: String,
    /// Password
    pub pass: String,
    /// Control port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: "anonymous".to_string(),
            pass: String::new(),
            port: 21,
        }
    }
}

/// Synchronization behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Glob patterns matched against entry names; matches are skipped with their subtree
    pub ignore: Vec<String>,
    /// Emit one status line per file
    pub verbose: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ignore: vec![".git".to_string(), ".DS_Store".to_string()],
            verbose: false,
        }
    }
}

/// Connection admission limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Ceiling on sessions open at once across all runs sharing a controller
    pub max_connections: ConnectionLimit,
    /// Sessions one run may hold against its target, which is also the worker pool width
    pub per_target: WorkerCount,
    /// How long a worker waits for a lease before the run is aborted
    pub acquire_timeout_ms: u64,
}

impl ConnectionSettings {
    /// Lease wait as a duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_connections: ConnectionLimit::default(),
            per_target: WorkerCount::default(),
            acquire_timeout_ms: 30_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            colored_output: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 21);
        assert_eq!(config.connections.max_connections.get(), 50);
        assert_eq!(config.connections.per_target.get(), 5);
        assert_eq!(
            config.connections.acquire_timeout(),
            Duration::from_secs(30)
        );
        assert!(!config.sync.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("max_connections: 50"));
        assert!(yaml.contains("per_target: 5"));
    }
}
