//! Run command

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::config::load_tree_config;
use crate::output::format_report;
use crate::scenario::{Scenario, ScenarioRunner};
use crate::Cli;

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (TOML)
    pub file: PathBuf,

    /// Exit with an error if any step was rejected
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: &RunArgs, cli: &Cli) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read scenario {}", args.file.display()))?;
    let scenario = Scenario::from_toml_str(&content)
        .with_context(|| format!("Invalid scenario {}", args.file.display()))?;

    // A [config] table in the scenario wins over the config file
    let config = match scenario.config.clone() {
        Some(config) => config,
        None => load_tree_config(cli.config.as_deref())?,
    };
    tracing::debug!("Running {} steps with {:?}", scenario.steps.len(), config);

    let report = ScenarioRunner::new(config).run(&scenario.steps)?;
    let rejected = report.rejected_count();

    if !cli.quiet {
        print!("{}", format_report(&report, cli.output_format())?);
    }

    if args.strict && rejected > 0 {
        anyhow::bail!("{} step(s) rejected", rejected);
    }
    Ok(())
}
