//! Plugin error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by stages and host loaders.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The host could not be booted.
    #[error("plugin initialization failed: {0}")]
    InitFailed(String),

    /// A plugin folder could not be loaded by the host.
    #[error("failed to load plugin folder {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// A stage did not complete.
    #[error("plugin execution failed: {0}")]
    ExecutionFailed(String),

    /// A stage or loader was given unusable settings.
    #[error("plugin configuration error: {0}")]
    ConfigError(String),

    /// Error raised by the code a stage delegates to.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Creates a [`PluginError::LoadFailed`] for the given folder.
    pub fn load_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
