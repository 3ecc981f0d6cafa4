//! Build command.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use twpack_core::{BUNDLE_STAGE, Project, artifact_file_name};

use super::BuildFlags;

/// Arguments for the build command.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Stages to run, with their dependencies (default: bump)
    pub stages: Vec<String>,

    #[command(flatten)]
    pub flags: BuildFlags,

    /// Remove generated directories before anything else runs
    #[arg(long)]
    pub clean: bool,
}

/// Runs the build command.
pub fn run(config: Option<&Path>, args: &BuildArgs) -> Result<()> {
    let project = super::open_project(config)?;
    let targets = Project::targets(&args.stages, args.clean);
    info!(targets = ?targets, production = args.flags.production, "starting build");

    let report = super::pipeline(&project)
        .run(&targets, &args.flags.context(&project))
        .context("build failed")?;

    for stage in &report.skipped {
        println!("Skipped {stage} (production only)");
    }
    println!("Completed: {}", report.completed.join(", "));

    if report.completed.iter().any(|stage| stage == BUNDLE_STAGE) {
        let manifest = project
            .manifest_store()
            .load()
            .context("failed to re-read manifest")?;
        let artifact = project
            .root()
            .join(&project.config().paths.bundle)
            .join(artifact_file_name(&project.config().plugin.name, manifest.version()));
        println!("Artifact: {}", artifact.display());
    }

    Ok(())
}
