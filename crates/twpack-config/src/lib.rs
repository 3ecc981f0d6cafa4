//! Configuration management for twpack.
//!
//! This crate handles loading and validating the `twpack.toml` configuration file.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_FILE_NAME, find_config, find_config_from, load_config};
pub use schema::{
    BUILTIN_STAGES, BundleConfig, CommandStageConfig, Config, CopyConfig, LoaderKind, PathsConfig,
    PluginConfig, VersionConfig,
};
