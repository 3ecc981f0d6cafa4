//! Configuration schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Names of the stages the runner provides itself.
pub const BUILTIN_STAGES: [&str; 4] = ["clean", "bump", "copy", "bundle"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Plugin identity.
    #[serde(default)]
    pub plugin: PluginConfig,

    /// Source and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Version configuration.
    #[serde(default)]
    pub version: VersionConfig,

    /// Bundler configuration.
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Copy stage configuration.
    #[serde(default)]
    pub copy: CopyConfig,

    /// External command stages, keyed by stage name.
    #[serde(default)]
    pub stages: BTreeMap<String, CommandStageConfig>,
}

impl Config {
    /// Checks values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("plugin.author", &self.plugin.author),
            ("plugin.name", &self.plugin.name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
            if value.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "{field} must not contain '/': {value}"
                )));
            }
        }

        for (name, stage) in &self.stages {
            if BUILTIN_STAGES.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "stage '{name}' shadows a built-in stage"
                )));
            }
            if stage.run.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "stage '{name}' has no commands to run"
                )));
            }
        }

        Ok(())
    }
}

/// Plugin identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin author, first half of the namespace.
    #[serde(default)]
    pub author: String,

    /// Plugin name, second half of the namespace.
    #[serde(default)]
    pub name: String,
}

impl PluginConfig {
    /// Returns `<author>/<name>`.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.author, self.name)
    }

    /// Returns the title the plugin manifest must carry.
    #[must_use]
    pub fn title(&self) -> String {
        format!("$:/plugins/{}", self.namespace())
    }
}

/// Source and output locations, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the plugin sources (`<source>/<author>/<name>`).
    #[serde(default = "default_source")]
    pub source: String,

    /// Compiled plugin tree.
    #[serde(default = "default_output")]
    pub output: String,

    /// Packaged artifacts.
    #[serde(default = "default_bundle")]
    pub bundle: String,

    /// Generated documentation.
    #[serde(default = "default_docs")]
    pub docs: String,

    /// Source maps.
    #[serde(default = "default_maps")]
    pub maps: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            bundle: default_bundle(),
            docs: default_docs(),
            maps: default_maps(),
        }
    }
}

fn default_source() -> String {
    "src".to_string()
}

fn default_output() -> String {
    "dist".to_string()
}

fn default_bundle() -> String {
    "bundle".to_string()
}

fn default_docs() -> String {
    "docs".to_string()
}

fn default_maps() -> String {
    "maps".to_string()
}

/// Version configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConfig {
    /// Increment the `+BUILD` counter on every bump.
    #[serde(default = "default_true")]
    pub auto_increment: bool,

    /// Manifest file name inside the plugin source folder.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Package descriptor kept in sync with the manifest; empty disables it.
    #[serde(default = "default_package")]
    pub package: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            auto_increment: true,
            manifest: default_manifest(),
            package: default_package(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_manifest() -> String {
    "plugin.info".to_string()
}

fn default_package() -> String {
    "package.json".to_string()
}

/// Which host loader the bundler uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Built-in Rust loader.
    #[default]
    Native,
    /// A TiddlyWiki installation driven through `node`.
    Node,
}

/// Bundler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Host loader.
    #[serde(default)]
    pub loader: LoaderKind,

    /// Node executable for [`LoaderKind::Node`].
    #[serde(default = "default_node")]
    pub node: String,

    /// Ring the terminal bell when the artifact is written.
    #[serde(default = "default_true")]
    pub notify: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            loader: LoaderKind::Native,
            node: default_node(),
            notify: true,
        }
    }
}

fn default_node() -> String {
    "node".to_string()
}

/// Copy stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Extensions left to the compile stage instead of being copied.
    #[serde(default = "default_exclude_extensions")]
    pub exclude_extensions: Vec<String>,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            exclude_extensions: default_exclude_extensions(),
        }
    }
}

fn default_exclude_extensions() -> Vec<String> {
    vec!["js".to_string()]
}

/// An external command stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandStageConfig {
    /// Shell command lines, run in order from the project root.
    #[serde(default)]
    pub run: Vec<String>,

    /// Stages that must run first and are pulled in with this one.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Stages that must finish first when they are part of the same run.
    #[serde(default)]
    pub after: Vec<String>,

    /// Only run in production builds.
    #[serde(default)]
    pub production_only: bool,

    /// Writes into the output tree, so bundling waits for it.
    #[serde(default = "default_true")]
    pub output: bool,
}
