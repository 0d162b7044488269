//! Command implementations

mod config;
mod geofence;
mod regions;
mod replay;
mod resolve;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config(cli.config.as_deref(), cli.config_overrides())?;

    match cli.command {
        Commands::Resolve(args) => resolve::execute(args, &config, &output),
        Commands::Regions(args) => regions::execute(args, &output),
        Commands::Geofence(args) => geofence::execute(args, &config, &output).await,
        Commands::Replay(args) => replay::execute(args, &config, &output).await,
        Commands::Config => config::execute(&config, &output),
    }
}
