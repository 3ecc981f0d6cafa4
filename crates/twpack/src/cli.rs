//! CLI definition.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Build, version and bundle TiddlyWiki plugins.
#[derive(Debug, Parser)]
#[command(name = "twpack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to twpack.toml (default: nearest one from the current directory)
    #[arg(short, long, global = true, env = "TWPACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter twpack.toml
    Init(commands::init::InitArgs),

    /// Bump the plugin version
    Bump(commands::bump::BumpArgs),

    /// Run build stages (default: bump)
    Build(commands::build::BuildArgs),

    /// Remove generated directories
    Clean,

    /// Show the execution phases of a build without running it
    Plan(commands::plan::PlanArgs),
}

impl Cli {
    /// Runs the CLI command.
    pub fn run(self) -> Result<()> {
        let config = self.config.as_deref();
        match self.command {
            Commands::Init(args) => commands::init::run(&args),
            Commands::Bump(args) => commands::bump::run(config, &args),
            Commands::Build(args) => commands::build::run(config, &args),
            Commands::Clean => commands::clean::run(config),
            Commands::Plan(args) => commands::plan::run(config, &args),
        }
    }
}
