//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Core-related errors.
///
/// Every variant is fatal for the build that raised it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Manifest title does not match the configured author and name.
    #[error("manifest title '{found}' does not match configured plugin '{expected}'")]
    ConfigMismatch { expected: String, found: String },

    /// Manifest file is missing.
    #[error("manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Manifest file is not a valid plugin manifest.
    #[error("failed to parse manifest {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// Manifest could not be written.
    #[error("failed to write manifest {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Package descriptor could not be updated.
    #[error("failed to update package descriptor")]
    PackageDescriptor(#[from] crate::FileUpdateError),

    /// Current version is not a semantic version.
    #[error("invalid version '{version}'")]
    Version {
        version: String,
        #[source]
        source: semver::Error,
    },

    /// The `+BUILD` counter cannot be incremented any further.
    #[error("build counter of version '{0}' is at its maximum")]
    BuildCounterOverflow(String),

    /// The host rejected the output tree.
    #[error("host could not load the plugin")]
    PluginLoad(#[source] twpack_plugin::PluginError),

    /// Artifact could not be written.
    #[error("failed to write artifact {path}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested or referenced stage does not exist.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Stage dependencies form a cycle.
    #[error("stage dependency cycle between: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// A stage failed; the pipeline was aborted.
    #[error("stage '{stage}' failed")]
    StageFailed {
        stage: String,
        #[source]
        source: twpack_plugin::PluginError,
    },

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for twpack_plugin::PluginError {
    fn from(err: CoreError) -> Self {
        Self::Other(Box::new(err))
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
