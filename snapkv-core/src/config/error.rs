//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {reason}")]
    FileReadError { path: String, reason: String },

    #[error("Failed to write configuration file {path}: {reason}")]
    FileWriteError { path: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    /// An environment variable held a value of the wrong shape
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}
