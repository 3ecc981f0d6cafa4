//! Plugin manifest store.
//!
//! The manifest (`plugin.info`) is the authoritative record of the plugin's
//! title and version. The package descriptor (`package.json`) mirrors the
//! version and is rewritten alongside it. Only one build may run against a
//! manifest at a time; the read-modify-write of a bump is not locked.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::files::{update_package_version, write_atomic};
use crate::version::{derive_version, parse_version};
use crate::{CoreError, CoreResult};

/// Title prefix shared by all plugin manifests.
const TITLE_PREFIX: &str = "$:/plugins/";

/// A plugin manifest.
///
/// `title` and `version` are guaranteed to be strings; every other field is
/// opaque and written back in its original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    /// Creates a manifest with only a title and a version.
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(title.into()));
        fields.insert("version".to_string(), Value::String(version.into()));
        Self { fields }
    }

    /// Reads a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ManifestNotFound`] if the file is missing and
    /// [`CoreError::ManifestParse`] if it is not a manifest object.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ManifestNotFound(path.to_path_buf()));
        }

        let content = fs::read(path)?;
        let value: Value =
            serde_json::from_slice(&content).map_err(|e| CoreError::ManifestParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Self::from_value(value).map_err(|reason| CoreError::ManifestParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Writes the manifest, pretty printed, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ManifestWrite`] on I/O failure; the previous file
    /// is left intact.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(&self.fields).map_err(|e| {
            CoreError::ManifestWrite {
                path: path.to_path_buf(),
                source: e.into(),
            }
        })?;

        write_atomic(path, format!("{content}\n").as_bytes()).map_err(|source| {
            CoreError::ManifestWrite {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(fields) = value else {
            return Err("not a JSON object".to_string());
        };
        for key in ["title", "version"] {
            match fields.get(key) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(format!("field '{key}' is not a string")),
                None => return Err(format!("missing field '{key}'")),
            }
        }
        Ok(Self { fields })
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns the manifest title (`$:/plugins/<author>/<name>`).
    #[must_use]
    pub fn title(&self) -> &str {
        self.str_field("title").unwrap_or_default()
    }

    /// Returns the version string.
    #[must_use]
    pub fn version(&self) -> &str {
        self.str_field("version").unwrap_or_default()
    }

    /// Returns the release timestamp, if the plugin was ever bumped.
    #[must_use]
    pub fn released(&self) -> Option<&str> {
        self.str_field("released")
    }

    /// Returns `<author>/<name>` when the title has the plugin prefix.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.title().strip_prefix(TITLE_PREFIX)
    }

    /// Returns the plugin name, the last segment of the namespace.
    #[must_use]
    pub fn plugin_name(&self) -> Option<&str> {
        self.namespace()
            .and_then(|ns| ns.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }

    /// Returns an opaque field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets an opaque field.
    ///
    /// `title` and `version` must stay strings; use the dedicated setters.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        debug_assert!(key != "title" && key != "version");
        self.fields.insert(key, value);
    }

    /// Records a new version released at `at`.
    pub fn set_release(&mut self, version: impl Into<String>, at: DateTime<Utc>) {
        self.fields
            .insert("version".to_string(), Value::String(version.into()));
        self.fields
            .insert("released".to_string(), Value::String(at.to_rfc2822()));
    }
}

/// Handle on the manifest and the package descriptor mirroring it.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    manifest_path: PathBuf,
    package_path: Option<PathBuf>,
}

impl ManifestStore {
    /// Creates a store for the manifest at `manifest_path`.
    #[must_use]
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            package_path: None,
        }
    }

    /// Keeps the package descriptor at `path` in sync with the manifest.
    #[must_use]
    pub fn with_package(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_path = Some(path.into());
        self
    }

    /// Returns the manifest path.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Returns the package descriptor path, if one is kept in sync.
    #[must_use]
    pub fn package_path(&self) -> Option<&Path> {
        self.package_path.as_deref()
    }

    /// Loads the manifest.
    ///
    /// # Errors
    ///
    /// See [`Manifest::load`].
    pub fn load(&self) -> CoreResult<Manifest> {
        debug!(path = %self.manifest_path.display(), "loading manifest");
        Manifest::load(&self.manifest_path)
    }

    /// Saves the manifest and mirrors its version into the package descriptor.
    ///
    /// The two writes are one logical operation but are not rolled back: if
    /// the descriptor update fails after the manifest was written, the error
    /// is returned and the files disagree until the next successful save.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub fn save(&self, manifest: &Manifest) -> CoreResult<()> {
        manifest.save(&self.manifest_path)?;

        if let Some(package_path) = &self.package_path {
            if let Err(err) = update_package_version(package_path, manifest.version()) {
                warn!(
                    manifest = %self.manifest_path.display(),
                    package = %package_path.display(),
                    error = %err,
                    "manifest written but package descriptor update failed; versions differ"
                );
                return Err(err.into());
            }
        }

        Ok(())
    }

    /// Derives and persists the next version.
    ///
    /// Returns the previous and the new version strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded, its version cannot be
    /// parsed, or either file cannot be written.
    pub fn bump(
        &self,
        mode: Option<&str>,
        auto_increment: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<(String, String)> {
        let mut manifest = self.load()?;
        let previous = manifest.version().to_string();
        let next = derive_version(&parse_version(&previous)?, mode, auto_increment)?;

        manifest.set_release(next.clone(), now);
        self.save(&manifest)?;

        info!(%previous, %next, "bumped plugin version");
        Ok((previous, next))
    }
}
