//! Configuration error types.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    NotFound(std::path::PathBuf),

    /// Invalid TOML syntax.
    #[error("invalid TOML")]
    InvalidToml(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
