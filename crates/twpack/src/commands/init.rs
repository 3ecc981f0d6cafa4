//! Initialize command.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Args;
use twpack_config::{CONFIG_FILE_NAME, PluginConfig};
use twpack_core::Manifest;

/// Arguments for the init command.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Plugin author (first half of the plugin namespace)
    #[arg(long, default_value = "author")]
    pub author: String,

    /// Plugin name (default: current directory name)
    #[arg(long)]
    pub name: Option<String>,
}

fn starter_config(plugin: &PluginConfig) -> String {
    format!(
        r#"[plugin]
author = "{author}"
name = "{name}"

[paths]
source = "src"
output = "dist"
bundle = "bundle"
docs = "docs"
maps = "maps"

[version]
auto_increment = true
manifest = "plugin.info"
package = ""

[bundle]
loader = "native"
notify = true

[copy]
exclude_extensions = ["js"]

# [stages.compile]
# run = ["npx babel src --out-dir dist"]
"#,
        author = plugin.author,
        name = plugin.name,
    )
}

/// Runs the init command.
pub fn run(args: &InitArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to read current directory")?;
    init_in(&cwd, args)
}

fn init_in(dir: &Path, args: &InitArgs) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    let name = match &args.name {
        Some(name) => name.clone(),
        None => dir
            .file_name()
            .map_or_else(|| "plugin".to_string(), |n| n.to_string_lossy().into_owned()),
    };
    let plugin = PluginConfig {
        author: args.author.clone(),
        name,
    };
    if plugin.author.contains('/') || plugin.name.contains('/') {
        bail!("author and name must not contain '/'");
    }

    fs::write(&config_path, starter_config(&plugin))
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    println!("Created {}", config_path.display());

    let source_dir = dir.join("src").join(plugin.namespace());
    let manifest_path = source_dir.join("plugin.info");
    if !manifest_path.exists() {
        fs::create_dir_all(&source_dir)
            .with_context(|| format!("failed to create {}", source_dir.display()))?;
        Manifest::new(plugin.title(), "0.1.0")
            .save(&manifest_path)
            .context("failed to write plugin manifest")?;
        println!("Created {}", manifest_path.display());
    }

    Ok(())
}
