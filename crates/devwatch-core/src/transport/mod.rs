//! Channel to the local discovery agent.
//!
//! [`ProbeSink`] is the outbound seam used by the prober and by subscriber
//! handles; [`TransportAdapter`] is the WebSocket implementation.

pub mod websocket;

pub use websocket::TransportAdapter;

use crate::protocol::ProbeCommand;

/// Fire-and-forget sink for probe commands.
pub trait ProbeSink: Send + Sync {
    /// Queue a command. Delivery is not guaranteed.
    fn send(&self, command: ProbeCommand);

    /// Whether the underlying channel is currently open.
    fn is_connected(&self) -> bool;

    /// Close the channel. Further sends are dropped.
    fn close(&self) {}

    fn probe_udp(&self, ip: &str) {
        if let Some(command) = ProbeCommand::poke(ip) {
            self.send(command);
        }
    }

    fn probe_tcp(&self, ip: &str) {
        if let Some(command) = ProbeCommand::poke_tcp(ip) {
            self.send(command);
        }
    }

    fn test_tcp(&self, ip: &str) {
        if let Some(command) = ProbeCommand::test_tcp(ip) {
            self.send(command);
        }
    }
}

/// Sink that drops everything.
pub struct NoopSink;

impl ProbeSink for NoopSink {
    fn send(&self, _command: ProbeCommand) {}

    fn is_connected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProbeKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<ProbeCommand>>);

    impl ProbeSink for Recording {
        fn send(&self, command: ProbeCommand) {
            self.0.lock().unwrap().push(command);
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_probe_helpers_skip_empty_addresses() {
        let sink = Recording::default();

        sink.probe_udp("10.0.0.5");
        sink.probe_tcp("");
        sink.test_tcp("10.0.0.6");

        let sent = sink.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].cmd, ProbeKind::Udp);
        assert_eq!(sent[1].cmd, ProbeKind::TestTcp);
        assert_eq!(sent[1].ipaddr, "10.0.0.6");
    }
}
