//! WebSocket channel to the local discovery agent.
//!
//! One background task owns the socket. It reconnects after a fixed delay,
//! forwards every valid inbound report and writes queued probe commands.
//! Commands issued while the channel is down are dropped, not buffered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::ProbeSink;
use crate::error::TransportError;
use crate::protocol::{parse_report, ProbeCommand};
use crate::types::DeviceReport;

/// Queue depth for outbound commands.
const COMMAND_QUEUE: usize = 64;

type AgentStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent, reconnecting channel to the discovery agent.
pub struct TransportAdapter {
    commands: mpsc::Sender<ProbeCommand>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TransportAdapter {
    /// Start the channel task. Valid reports are forwarded to `reports`.
    pub fn spawn(
        url: String,
        connect_timeout: Duration,
        reconnect_delay: Duration,
        reports: mpsc::Sender<DeviceReport>,
    ) -> Self {
        let (commands, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_channel(
            url,
            connect_timeout,
            reconnect_delay,
            commands_rx,
            reports,
            Arc::clone(&connected),
        ));

        Self {
            commands,
            connected,
            task,
        }
    }
}

impl ProbeSink for TransportAdapter {
    fn send(&self, command: ProbeCommand) {
        if !self.is_connected() {
            debug!("Channel down, dropping {} {}", command.cmd.as_str(), command.ipaddr);
            return;
        }

        if let Err(e) = self.commands.try_send(command) {
            warn!("Dropping probe command: {}", e);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.task.abort();
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for TransportAdapter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn connect(url: &str, connect_timeout: Duration) -> Result<AgentStream, TransportError> {
    let (ws_stream, _) = timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| TransportError::Connect {
            url: url.to_string(),
            message: "connection timeout".to_string(),
        })?
        .map_err(|e| TransportError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    Ok(ws_stream)
}

async fn run_channel(
    url: String,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    mut commands: mpsc::Receiver<ProbeCommand>,
    reports: mpsc::Sender<DeviceReport>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connect(&url, connect_timeout).await {
            Ok(ws_stream) => {
                info!("Connected to discovery agent at {}", url);
                connected.store(true, Ordering::SeqCst);

                let result = pump(ws_stream, &mut commands, &reports).await;
                connected.store(false, Ordering::SeqCst);

                match result {
                    Ok(()) => {
                        info!("Discovery agent channel shut down");
                        return;
                    }
                    Err(e) => warn!("Discovery agent channel lost: {}", e),
                }
            }
            Err(e) => warn!("{}", e),
        }

        if reports.is_closed() {
            return;
        }

        tokio::time::sleep(reconnect_delay).await;

        // Anything queued while disconnected is stale.
        while commands.try_recv().is_ok() {}
    }
}

/// Shuttle frames until the socket fails. Returns `Ok` only when the
/// command side has been dropped or the report consumer is gone.
async fn pump(
    ws_stream: AgentStream,
    commands: &mut mpsc::Receiver<ProbeCommand>,
    reports: &mpsc::Sender<DeviceReport>,
) -> Result<(), TransportError> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    let _ = write.close().await;
                    return Ok(());
                };

                debug!("Sending {} to {}", command.cmd.as_str(), command.ipaddr);
                write
                    .send(Message::Text(command.to_frame()))
                    .await
                    .map_err(|e| TransportError::Send(e.to_string()))?;
            }
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if !forward_report(&text, reports) {
                            let _ = write.close().await;
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                }
            }
        }
    }
}

/// Parse and forward one frame. Returns false once the consumer is gone.
///
/// Never waits on the consumer: a full queue drops the report so outbound
/// commands keep flowing.
fn forward_report(text: &str, reports: &mpsc::Sender<DeviceReport>) -> bool {
    match parse_report(text) {
        Ok(report) => {
            debug!(
                "Report from {} ({}): alive={}",
                report.record.uuid,
                report.record.ipaddr.as_deref().unwrap_or("-"),
                report.alive
            );
            match reports.try_send(report) {
                Ok(()) => true,
                Err(TrySendError::Full(report)) => {
                    warn!("Report queue full, dropping report from {}", report.record.uuid);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        }
        Err(e) => {
            warn!("Dropping report: {}", e);
            true
        }
    }
}
