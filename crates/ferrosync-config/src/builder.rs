//! Configuration builder for flexible configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use ferrosync_types::{ConnectionLimit, WorkerCount};
use std::path::{Path, PathBuf};

/// Legacy variable overriding `connections.max_connections`
pub const LEGACY_MAX_CONNECTIONS: &str = "FTP_MAX_CONNECTIONS";
/// Legacy variable overriding `connections.per_target`
pub const LEGACY_MAX_CONNECTIONS_PER_IP: &str = "FTP_MAX_CONNECTIONS_PER_IP";

/// Configuration builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
    legacy_env: bool,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
            legacy_env: false,
        }
    }

    /// Add a configuration file source; missing files are skipped
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Honor `FTP_MAX_CONNECTIONS` and `FTP_MAX_CONNECTIONS_PER_IP`
    pub fn with_legacy_env(mut self) -> Self {
        self.legacy_env = true;
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // Defaults are the base layer, everything else overrides them
        let defaults_value = serde_yaml::to_value(Config::default())?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator("_")
                            .separator(&self.env_separator)
                            .try_parsing(true)
                            .list_separator(",")
                            .with_list_parse_key("sync.ignore"),
                    );
                }
            }
        }

        let mut result: Config = self.inner.build()?.try_deserialize()?;

        if self.legacy_env {
            apply_legacy_overrides(&mut result, |key| std::env::var(key).ok())?;
        }

        Self::validate(&result)?;
        Ok(result)
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    pub(crate) fn validate(config: &Config) -> ConfigResult<()> {
        if config.server.host.trim().is_empty() {
            return Err(ConfigError::validation("Server host must not be empty"));
        }

        if config.server.port == 0 {
            return Err(ConfigError::validation("Server port must be greater than 0"));
        }

        if config.connections.per_target.get() > config.connections.max_connections.get() {
            return Err(ConfigError::validation(
                "Per-target connections must not exceed the connection ceiling",
            ));
        }

        if config.connections.acquire_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "Acquire timeout must be greater than 0",
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if let Some(pattern) = config.sync.ignore.iter().find(|p| p.trim().is_empty()) {
            return Err(ConfigError::validation(format!(
                "Ignore patterns must not be empty (got {pattern:?})"
            )));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the legacy connection variables, reading them through `lookup`
pub fn apply_legacy_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(LEGACY_MAX_CONNECTIONS) {
        let limit = parse_count(LEGACY_MAX_CONNECTIONS, &raw)?;
        config.connections.max_connections = ConnectionLimit::new(limit)
            .map_err(|e| ConfigError::environment(LEGACY_MAX_CONNECTIONS, e))?;
    }

    if let Some(raw) = lookup(LEGACY_MAX_CONNECTIONS_PER_IP) {
        let count = parse_count(LEGACY_MAX_CONNECTIONS_PER_IP, &raw)?;
        config.connections.per_target = WorkerCount::new(count)
            .map_err(|e| ConfigError::environment(LEGACY_MAX_CONNECTIONS_PER_IP, e))?;
    }

    Ok(())
}

fn parse_count(variable: &str, raw: &str) -> ConfigResult<usize> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::environment(variable, format!("'{raw}' ({e})")))
}
