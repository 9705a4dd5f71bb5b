//! Probe command implementation.

use std::time::Duration;

use devwatch_core::prober::validate_probe_address;
use devwatch_core::protocol::{ProbeCommand, ProbeKind};
use devwatch_core::transport::{ProbeSink, TransportAdapter};
use devwatch_core::RegistryConfig;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::cli::ProbeArgs;
use crate::error::CliError;
use crate::output::get_formatter;

/// Time allowed for the queued frame to reach the socket before closing.
const FLUSH_GRACE: Duration = Duration::from_millis(250);

/// Validate the address and send one probe command.
pub async fn run_probe(args: ProbeArgs, config: RegistryConfig, json: bool) -> Result<(), CliError> {
    let ip = validate_probe_address(&args.ip)?.to_string();
    let kind = ProbeKind::from(args.mode);
    let command = ProbeCommand::new(kind, &ip)
        .ok_or_else(|| CliError::InvalidArgument("empty address".to_string()))?;

    // Reports are not needed, but the channel must stay open and drained while connected.
    let (reports_tx, mut reports_rx) = mpsc::channel(16);
    let drain = tokio::spawn(async move { while reports_rx.recv().await.is_some() {} });
    let adapter = TransportAdapter::spawn(
        config.agent_url.clone(),
        config.connect_timeout(),
        config.reconnect_delay(),
        reports_tx,
    );

    let deadline = Instant::now() + config.connect_timeout();
    while !adapter.is_connected() {
        if Instant::now() >= deadline {
            adapter.close();
            drain.abort();
            return Err(CliError::NotConnected(config.agent_url));
        }
        sleep(Duration::from_millis(50)).await;
    }

    adapter.send(command);
    sleep(FLUSH_GRACE).await;
    adapter.close();
    drain.abort();

    println!("{}", get_formatter(json).format_probe(&ip, kind));
    Ok(())
}
