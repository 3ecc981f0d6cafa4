//! Package descriptor updates and atomic file writes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors raised while reading or rewriting the package descriptor.
#[derive(Debug, Error)]
pub enum FileUpdateError {
    /// The descriptor does not exist.
    #[error("package descriptor not found: {0}")]
    NotFound(PathBuf),

    /// The descriptor could not be read or replaced.
    #[error("failed to access package descriptor")]
    Io(#[from] std::io::Error),

    /// The descriptor is not a JSON object.
    #[error("malformed package descriptor {file}: {reason}")]
    ParseError { file: PathBuf, reason: String },

    /// The descriptor has no `version` field.
    #[error("no version field in {0}")]
    VersionNotFound(PathBuf),
}

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileUpdateError>;

/// Replaces `path` with `contents` without ever exposing a partial file.
///
/// The data goes to a temporary file in the same directory, which is then
/// renamed over the target.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

/// Sets the `version` field of a package descriptor, leaving every other
/// field untouched.
///
/// # Errors
///
/// Fails when the descriptor is missing, is not a JSON object, has no
/// `version` field, or cannot be replaced.
pub fn update_package_version(path: &Path, new_version: &str) -> FileResult<()> {
    let mut json = read_package_json(path)?;

    let Some(obj) = json.as_object_mut() else {
        return Err(FileUpdateError::ParseError {
            file: path.to_path_buf(),
            reason: "not a JSON object".to_string(),
        });
    };
    if !obj.contains_key("version") {
        return Err(FileUpdateError::VersionNotFound(path.to_path_buf()));
    }
    obj.insert(
        "version".to_string(),
        serde_json::Value::String(new_version.to_string()),
    );

    // Pretty formatting with a trailing newline, as npm writes it
    let new_content =
        serde_json::to_string_pretty(&json).map_err(|e| FileUpdateError::ParseError {
            file: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    write_atomic(path, format!("{new_content}\n").as_bytes())?;

    Ok(())
}

/// Reads the `version` field of a package descriptor.
///
/// # Errors
///
/// Returns an error if the file is missing, unparseable or has no string
/// `version` field.
pub fn read_package_version(path: &Path) -> FileResult<String> {
    let json = read_package_json(path)?;

    json.get("version")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| FileUpdateError::VersionNotFound(path.to_path_buf()))
}

fn read_package_json(path: &Path) -> FileResult<serde_json::Value> {
    if !path.exists() {
        return Err(FileUpdateError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;

    serde_json::from_str(&content).map_err(|e| FileUpdateError::ParseError {
        file: path.to_path_buf(),
        reason: e.to_string(),
    })
}
