//! Clean command.

use std::path::Path;

use anyhow::{Context, Result};
use twpack_core::CLEAN_STAGE;

/// Runs the clean command.
pub fn run(config: Option<&Path>) -> Result<()> {
    let project = super::open_project(config)?;
    super::pipeline(&project)
        .run(&[CLEAN_STAGE], &project.context())
        .context("clean failed")?;
    println!("Cleaned generated directories");
    Ok(())
}
