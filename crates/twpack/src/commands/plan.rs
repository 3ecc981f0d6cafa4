//! Plan command.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use twpack_core::Project;

/// Arguments for the plan command.
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Stages to plan (default: bump)
    pub stages: Vec<String>,

    /// Include the clean stage
    #[arg(long)]
    pub clean: bool,
}

/// Runs the plan command.
pub fn run(config: Option<&Path>, args: &PlanArgs) -> Result<()> {
    let project = super::open_project(config)?;
    let pipeline = super::pipeline(&project);
    let phases = pipeline
        .plan(&Project::targets(&args.stages, args.clean))
        .context("failed to plan build")?;

    for (index, phase) in phases.iter().enumerate() {
        println!("Phase {}: {}", index + 1, phase.join(", "));
    }
    Ok(())
}
