//! Build context shared between stages.

use std::path::{Path, PathBuf};

/// Mode label that stands for the mainline build and never appears in versions.
pub const MAINLINE_MODE: &str = "master";

/// Returns the mode label that belongs in a version string.
///
/// `"master"` and an empty label are treated the same as no label.
#[must_use]
pub fn mode_label(mode: Option<&str>) -> Option<&str> {
    mode.filter(|mode| !mode.is_empty() && *mode != MAINLINE_MODE)
}

/// Per-invocation flags every stage can read.
///
/// The context is immutable once the pipeline starts; stages that need to
/// persist state do so through their own resources (the manifest store, the
/// output tree).
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Project root that relative paths are resolved against.
    pub root: PathBuf,

    /// Whether this is a production build.
    pub production: bool,

    /// Optional build label (e.g. "develop", "testing").
    pub mode: Option<String>,
}

impl BuildContext {
    /// Creates a development build context rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            production: false,
            mode: None,
        }
    }

    /// Sets the production flag.
    #[must_use]
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Sets the build mode label.
    #[must_use]
    pub fn mode(mut self, mode: Option<String>) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the mode label that belongs in a version string.
    #[must_use]
    pub fn mode_label(&self) -> Option<&str> {
        mode_label(self.mode.as_deref())
    }

    /// Resolves a path relative to the project root.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }
}
