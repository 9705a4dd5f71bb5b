//! Probe target list management.

use std::path::PathBuf;
use std::sync::Arc;

use devwatch_core::prober::{validate_probe_address, ProbeTargets};
use devwatch_core::storage::{default_data_dir, FileStore, KeyValueStore};
use devwatch_core::RegistryConfig;

use crate::cli::{TargetsArgs, TargetsCommands};
use crate::error::{CliError, StorageError};
use crate::output::get_formatter;

/// Run the targets command
pub fn run_targets(
    args: TargetsArgs,
    config: RegistryConfig,
    data_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let mut targets = open_targets(&config, data_dir)?;

    match args.command {
        TargetsCommands::List => {
            println!("{}", formatter.format_targets(targets.addresses()));
        }
        TargetsCommands::Add(add) => {
            let ip = validate_probe_address(&add.ip)?.to_string();
            let message = if targets.append(&ip) {
                format!("Added {}", ip)
            } else {
                format!("{} is already a probe target", ip)
            };
            println!("{}", formatter.format_message(&message));
        }
        TargetsCommands::Clear => {
            targets.clear();
            println!("{}", formatter.format_message("Probe targets cleared"));
        }
    }

    Ok(())
}

fn open_targets(config: &RegistryConfig, data_dir: Option<PathBuf>) -> Result<ProbeTargets, CliError> {
    let dir = data_dir
        .or_else(default_data_dir)
        .ok_or_else(|| StorageError::DirectoryAccess("no platform data directory".to_string()))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir)?);
    Ok(ProbeTargets::load(store, config))
}
