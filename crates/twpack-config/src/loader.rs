//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Config, ConfigError, ConfigResult};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "twpack.toml";

/// Reads `twpack.toml` at `path` and validates it.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] for a missing file,
/// [`ConfigError::InvalidToml`] for a syntax or type error and
/// [`ConfigError::Invalid`] when validation fails.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let config: Config = toml::from_str(&fs::read_to_string(path)?)?;
    config.validate()?;
    debug!(path = %path.display(), plugin = %config.plugin.title(), "loaded configuration");

    Ok(config)
}

/// Locates `twpack.toml` from the current directory upwards.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if no directory up to the filesystem
/// root holds one.
pub fn find_config() -> ConfigResult<PathBuf> {
    find_config_from(std::env::current_dir()?)
}

/// Locates `twpack.toml` in `start_dir` or the nearest parent holding one.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] naming the file expected in `start_dir`.
pub fn find_config_from(start_dir: impl AsRef<Path>) -> ConfigResult<PathBuf> {
    let start_dir = start_dir.as_ref();
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound(start_dir.join(CONFIG_FILE_NAME)))
}
