//! Config command for managing tree configuration

use std::path::PathBuf;

use clap::{Args, Subcommand};
use glacier_tree_core::TreeConfig;

use crate::config::{config_file_path, load_tree_config, save_tree_config};
use crate::output::{to_json, OutputFormat};
use crate::Cli;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective tree configuration
    Show,
    /// Show config file path
    Path,
    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
        /// Write to this path instead of the default location
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub fn run(args: &ConfigArgs, cli: &Cli) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Show => run_show(cli),
        ConfigCommands::Path => run_path(cli),
        ConfigCommands::Init { force, path } => run_init(*force, path.clone()),
    }
}

fn run_show(cli: &Cli) -> anyhow::Result<()> {
    let config = load_tree_config(cli.config.as_deref())?;
    match cli.output_format() {
        OutputFormat::Json => println!("{}", to_json(&config)?),
        OutputFormat::Table => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

fn run_path(cli: &Cli) -> anyhow::Result<()> {
    let path = cli.config.clone().unwrap_or_else(config_file_path);
    println!("{}", path.display());
    Ok(())
}

fn run_init(force: bool, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config_file_path);

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    save_tree_config(&TreeConfig::default(), &path)?;
    println!("Created config file at {}", path.display());
    Ok(())
}
