//! Watch command implementation.

use std::io::{self, Write};
use std::path::PathBuf;

use colored::*;
use devwatch_core::{DiscoveryService, RegistryConfig};
use log::info;

use crate::error::CliError;
use crate::output::get_formatter;

const BANNER: &str = "Watching for devices (press Ctrl+C to stop)...\n";

/// Human-readable preamble; JSON output stays machine-parseable.
fn banner(json: bool) -> Option<&'static str> {
    (!json).then_some(BANNER)
}

/// Run the registry and redraw the device list on every broadcast.
pub async fn run_watch(
    config: RegistryConfig,
    data_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    if let Some(banner) = banner(json) {
        println!("{}", banner);
    }

    let handle = DiscoveryService::connect(config, data_dir)?;
    let formatter = get_formatter(json);
    let status = handle.clone();

    let subscription = handle.register("cli-watch", move |devices| {
        if !json {
            print!("\x1B[2J\x1B[1;1H");
            println!("{}", "devwatch".bold());
            let link = if status.is_connected() {
                "agent connected".green()
            } else {
                "agent disconnected".red()
            };
            println!("{}  {}", link, "Press Ctrl+C to stop".dimmed());
            println!();
        }

        println!("{}", formatter.format_devices(devices));
        io::stdout().flush().ok();
    });

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");

    subscription.unregister();
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_only_for_tables() {
        assert_eq!(banner(false), Some(BANNER));
        assert_eq!(banner(true), None);
    }
}
