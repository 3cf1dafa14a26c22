//! Configuration management for snapkv
//!
//! Values come from defaults, a TOML file, or `SNAPKV_<SECTION>_<KEY>`
//! environment variables. Command-line flags are applied on top by the
//! binary.

use crate::logging::{LogConfig, LogLevel};
use crate::sync::AntiEntropyConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub replication: ReplicationConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Node lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// How long shutdown waits for in-flight work before giving up
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Anti-entropy replication configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Disable to run as a single, unreplicated node
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve a Prometheus scrape endpoint
    pub enabled: bool,

    pub bind_address: SocketAddr,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval: Duration::from_millis(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

impl ReplicationConfig {
    pub fn anti_entropy(&self) -> AntiEntropyConfig {
        AntiEntropyConfig {
            sync_interval: self.sync_interval,
        }
    }
}

impl LoggingConfig {
    /// Settings for `logging::init_logging_with_config`
    pub fn log_config(&self) -> Result<LogConfig, ConfigError> {
        let level = LogLevel::parse(&self.level)
            .ok_or_else(|| ConfigError::ValidationFailed(format!("Invalid log level: {}", self.level)))?;

        Ok(LogConfig::new(level)
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format))
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: SNAPKV_<SECTION>_<KEY>
    /// Example: SNAPKV_REPLICATION_SYNC_INTERVAL_MS=25
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|var| env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `SNAPKV_*` overrides found through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SNAPKV_NODE_SHUTDOWN_TIMEOUT_MS")? {
            self.node.shutdown_timeout = Duration::from_millis(ms);
        }

        if let Some(enabled) = parse_var(&lookup, "SNAPKV_REPLICATION_ENABLED")? {
            self.replication.enabled = enabled;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SNAPKV_REPLICATION_SYNC_INTERVAL_MS")? {
            self.replication.sync_interval = Duration::from_millis(ms);
        }

        if let Some(level) = lookup("SNAPKV_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var(&lookup, "SNAPKV_LOG_JSON")? {
            self.logging.json_format = json;
        }

        if let Some(enabled) = parse_var(&lookup, "SNAPKV_METRICS_ENABLED")? {
            self.metrics.enabled = enabled;
        }
        if let Some(addr) = parse_var(&lookup, "SNAPKV_METRICS_BIND_ADDRESS")? {
            self.metrics.bind_address = addr;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.shutdown_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "shutdown_timeout must be greater than 0".to_string(),
            ));
        }

        if self.replication.sync_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "sync_interval must be greater than 0".to_string(),
            ));
        }

        self.logging.log_config()?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var: var.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
