//! Discover command implementation.

use std::path::PathBuf;
use std::time::Duration;

use devwatch_core::{DiscoveryService, RegistryConfig};

use crate::cli::DiscoverArgs;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the registry for a fixed time and print the final snapshot.
pub async fn run_discover(
    args: DiscoverArgs,
    config: RegistryConfig,
    data_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    if args.duration == 0 {
        return Err(CliError::InvalidArgument(
            "duration must be at least 1 second".to_string(),
        ));
    }

    let formatter = get_formatter(json);
    if !json {
        println!("Discovering devices for {} seconds...", args.duration);
    }

    let handle = DiscoveryService::connect(config, data_dir)?;
    tokio::time::sleep(Duration::from_secs(args.duration)).await;

    let devices = handle.snapshot();
    handle.shutdown().await;

    println!("{}", formatter.format_devices(&devices));

    if devices.is_empty() {
        return Err(CliError::NoDevicesFound);
    }

    Ok(())
}
