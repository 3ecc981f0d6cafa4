//! Bump command.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use twpack_core::BUMP_STAGE;

use super::BuildFlags;

/// Arguments for the bump command.
#[derive(Debug, Args)]
pub struct BumpArgs {
    #[command(flatten)]
    pub flags: BuildFlags,
}

/// Runs the bump command.
pub fn run(config: Option<&Path>, args: &BumpArgs) -> Result<()> {
    let project = super::open_project(config)?;
    let previous = project.manifest().version().to_string();

    super::pipeline(&project)
        .run(&[BUMP_STAGE], &args.flags.context(&project))
        .context("bump failed")?;

    let next = project
        .manifest_store()
        .load()
        .context("failed to re-read manifest")?;
    println!("Bumped version {previous} -> {}", next.version());
    Ok(())
}
