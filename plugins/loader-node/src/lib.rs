//! Plugin folder loader backed by a TiddlyWiki installation.
//!
//! Each load spawns `node` with a small boot script that requires the
//! `tiddlywiki` package from the project, boots the host with the stored
//! invocation and writes the result of `loadPluginFolder` to a temp file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;
use twpack_plugin::{Plugin, PluginError, PluginLoader, PluginResult, TiddlerRecord};

/// Script run by `node -e`; its last three arguments are the JSON encoded
/// invocation, the plugin folder and the output file.
pub const BOOT_SCRIPT: &str = r#"
const [argv, folder, out] = process.argv.slice(-3);
const $tw = require("tiddlywiki").TiddlyWiki();
$tw.boot.argv = JSON.parse(argv);
$tw.boot.boot(function () {
    const plugin = $tw.loadPluginFolder(folder);
    if (!plugin) {
        console.error("not a plugin folder: " + folder);
        process.exit(2);
    }
    require("fs").writeFileSync(out, JSON.stringify(plugin));
});
"#;

/// Loads plugin folders through `node` and the `tiddlywiki` package.
#[derive(Debug)]
pub struct NodeLoader {
    node: PathBuf,
    workdir: Option<PathBuf>,
    invocation: Option<Vec<String>>,
}

impl NodeLoader {
    /// Creates a loader using the `node` on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: PathBuf::from("node"),
            workdir: None,
            invocation: None,
        }
    }

    /// Sets the node executable.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = node.into();
        self
    }

    /// Sets the directory `tiddlywiki` is resolved from.
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Returns the node executable.
    #[must_use]
    pub fn node(&self) -> &Path {
        &self.node
    }

    /// Returns the boot invocation, once booted.
    #[must_use]
    pub fn invocation(&self) -> Option<&[String]> {
        self.invocation.as_deref()
    }
}

impl Default for NodeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for NodeLoader {
    fn name(&self) -> &str {
        "node"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Loads plugin folders with the tiddlywiki package under node"
    }
}

impl PluginLoader for NodeLoader {
    fn boot(&mut self, invocation: &[String]) -> PluginResult<()> {
        if invocation.is_empty() {
            return Err(PluginError::InitFailed(
                "refusing to boot with an empty invocation".to_string(),
            ));
        }
        self.invocation = Some(invocation.to_vec());
        Ok(())
    }

    fn load_plugin(&self, folder: &Path) -> PluginResult<TiddlerRecord> {
        let Some(invocation) = &self.invocation else {
            return Err(PluginError::InitFailed(
                "loader used before boot".to_string(),
            ));
        };
        if !folder.is_dir() {
            return Err(PluginError::load_failed(folder, "plugin folder not found"));
        }

        let argv = serde_json::to_string(invocation)
            .map_err(|e| PluginError::InitFailed(e.to_string()))?;
        let out = NamedTempFile::new()?;

        let mut command = Command::new(&self.node);
        command
            .arg("-e")
            .arg(BOOT_SCRIPT)
            .arg(&argv)
            .arg(folder)
            .arg(out.path());
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }

        debug!(node = %self.node.display(), folder = %folder.display(), "loading plugin folder");
        let output = command.output().map_err(|e| {
            PluginError::InitFailed(format!("failed to run {}: {e}", self.node.display()))
        })?;

        if !output.status.success() {
            return Err(PluginError::load_failed(
                folder,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_record(folder, &fs::read_to_string(out.path())?)
    }
}

/// Parses the JSON record written by the boot script.
///
/// # Errors
///
/// Returns [`PluginError::LoadFailed`] unless `json` is a JSON object.
pub fn parse_record(folder: &Path, json: &str) -> PluginResult<TiddlerRecord> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| PluginError::load_failed(folder, e.to_string()))?;
    TiddlerRecord::from_value(value)
        .ok_or_else(|| PluginError::load_failed(folder, "host returned no plugin record"))
}
