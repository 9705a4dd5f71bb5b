//! devwatch - watch LAN and relay-reachable devices from the terminal.
//!
//! Runs the discovery registry against a local agent and an optional relay
//! service, and edits the persisted probe target list.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use env_logger::Env;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.registry_config()?;
    let data_dir = cli.data_dir.clone();

    match cli.command {
        Commands::Watch => commands::run_watch(config, data_dir, cli.json).await,
        Commands::Discover(args) => {
            commands::run_discover(args, config, data_dir, cli.json).await
        }
        Commands::Probe(args) => commands::run_probe(args, config, cli.json).await,
        Commands::Targets(args) => commands::run_targets(args, config, data_dir, cli.json),
    }
}
