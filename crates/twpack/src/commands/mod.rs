//! Command implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;
use twpack_config::{Config, LoaderKind, find_config, load_config};
use twpack_core::{Pipeline, Project};
use twpack_loader_native::NativeLoader;
use twpack_loader_node::NodeLoader;
use twpack_plugin::{BuildContext, PluginLoader};

pub mod build;
pub mod bump;
pub mod clean;
pub mod init;
pub mod plan;

/// Flags shared by the commands that run stages.
#[derive(Debug, Args)]
pub struct BuildFlags {
    /// Production build (runs production-only stages)
    #[arg(short, long)]
    pub production: bool,

    /// Build label appended to the version (e.g. develop, testing)
    #[arg(short, long)]
    pub mode: Option<String>,
}

impl BuildFlags {
    /// Returns the build context for `project`.
    pub fn context(&self, project: &Project) -> BuildContext {
        project
            .context()
            .production(self.production)
            .mode(self.mode.clone())
    }
}

/// Loads the configuration and opens the project it describes.
///
/// The project root is the directory holding the configuration file.
pub fn open_project(config_path: Option<&Path>) -> Result<Project> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config().context("failed to locate twpack.toml")?,
    };
    let config = load_config(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    let root = project_root(&path);
    debug!(root = %root.display(), "opening project");

    Project::open(root, config).context("failed to open plugin project")
}

fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Creates the host loader selected in the configuration.
pub fn create_loader(config: &Config, root: &Path) -> Box<dyn PluginLoader> {
    match config.bundle.loader {
        LoaderKind::Native => Box::new(NativeLoader::new()),
        LoaderKind::Node => Box::new(
            NodeLoader::new()
                .with_node(&config.bundle.node)
                .with_workdir(root),
        ),
    }
}

/// Builds the stage pipeline of `project`.
pub fn pipeline(project: &Project) -> Pipeline {
    project.pipeline(create_loader(project.config(), project.root()))
}
