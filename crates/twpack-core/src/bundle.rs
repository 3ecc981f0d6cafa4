//! Plugin bundling.
//!
//! The bundler asks the host loader to serialize the compiled plugin folder
//! into one tiddler record and writes it, array-wrapped, as the importable
//! artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use twpack_plugin::{HOST_PLACEHOLDER_ARG, PluginError, PluginLoader, to_host_json};

use crate::files::write_atomic;
use crate::{CoreError, CoreResult, Manifest};

/// Returns the artifact file name for a plugin version.
#[must_use]
pub fn artifact_file_name(plugin_name: &str, version: &str) -> String {
    format!("{plugin_name}_{version}.json")
}

/// Packages a compiled plugin tree into an importable artifact.
pub struct Bundler {
    loader: Box<dyn PluginLoader>,
    output_root: PathBuf,
    bundle_dir: PathBuf,
    notify: bool,
    booted: bool,
}

impl Bundler {
    /// Creates a bundler reading from `output_root` and writing into `bundle_dir`.
    #[must_use]
    pub fn new(
        loader: Box<dyn PluginLoader>,
        output_root: impl Into<PathBuf>,
        bundle_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            loader,
            output_root: output_root.into(),
            bundle_dir: bundle_dir.into(),
            notify: false,
            booted: false,
        }
    }

    /// Rings the terminal bell once an artifact is written.
    #[must_use]
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Returns the loader name.
    #[must_use]
    pub fn loader_name(&self) -> &str {
        self.loader.name()
    }

    /// Returns the artifact directory.
    #[must_use]
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Bundles the plugin described by `manifest` and returns the artifact path.
    ///
    /// Bundling the same output tree and manifest again rewrites the same file
    /// with identical content.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PluginLoad`] if the host cannot load the plugin
    /// folder and [`CoreError::ArtifactWrite`] if the artifact cannot be
    /// written. No partial artifact is left behind.
    pub fn bundle(&mut self, manifest: &Manifest) -> CoreResult<PathBuf> {
        if !self.booted {
            debug!(loader = self.loader.name(), "booting host");
            self.loader
                .boot(&[HOST_PLACEHOLDER_ARG.to_string()])
                .map_err(CoreError::PluginLoad)?;
            self.booted = true;
        }

        let (Some(namespace), Some(plugin_name)) = (manifest.namespace(), manifest.plugin_name())
        else {
            return Err(CoreError::PluginLoad(PluginError::ConfigError(format!(
                "'{}' is not a plugin title",
                manifest.title()
            ))));
        };

        let folder = self.output_root.join(namespace);
        debug!(folder = %folder.display(), "loading plugin folder");
        let record = self
            .loader
            .load_plugin(&folder)
            .map_err(CoreError::PluginLoad)?;

        std::fs::create_dir_all(&self.bundle_dir).map_err(|source| CoreError::ArtifactWrite {
            path: self.bundle_dir.clone(),
            source,
        })?;

        let path = self
            .bundle_dir
            .join(artifact_file_name(plugin_name, manifest.version()));
        let content = to_host_json(&[record]).map_err(|e| CoreError::ArtifactWrite {
            path: path.clone(),
            source: e.into(),
        })?;
        write_atomic(&path, content.as_bytes()).map_err(|source| CoreError::ArtifactWrite {
            path: path.clone(),
            source,
        })?;

        info!(artifact = %path.display(), version = manifest.version(), "plugin bundled");
        if self.notify {
            ring_bell();
        }

        Ok(path)
    }
}

fn ring_bell() {
    let mut stdout = std::io::stdout();
    // Best effort: a closed stdout must not fail a finished bundle
    let _ = stdout.write_all(b"\x07").and_then(|()| stdout.flush());
}
