//! Probe commands sent to the discovery agent.
//!
//! Commands are JSON text frames of the form `{"cmd": "poke", "ipaddr": "10.0.0.5"}`.

use serde::{Deserialize, Serialize};

/// Probe flavour understood by the discovery agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeKind {
    /// UDP poke
    #[serde(rename = "poke")]
    Udp,
    /// TCP poke
    #[serde(rename = "poketcp")]
    Tcp,
    /// TCP reachability test
    #[serde(rename = "testtcp")]
    TestTcp,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Udp => "poke",
            ProbeKind::Tcp => "poketcp",
            ProbeKind::TestTcp => "testtcp",
        }
    }
}

/// An outbound probe command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCommand {
    pub cmd: ProbeKind,
    pub ipaddr: String,
}

impl ProbeCommand {
    /// Build a probe command. Returns `None` for an empty address.
    pub fn new(cmd: ProbeKind, ip: &str) -> Option<Self> {
        let ip = ip.trim();
        if ip.is_empty() {
            return None;
        }

        Some(Self {
            cmd,
            ipaddr: ip.to_string(),
        })
    }

    pub fn poke(ip: &str) -> Option<Self> {
        Self::new(ProbeKind::Udp, ip)
    }

    pub fn poke_tcp(ip: &str) -> Option<Self> {
        Self::new(ProbeKind::Tcp, ip)
    }

    pub fn test_tcp(ip: &str) -> Option<Self> {
        Self::new(ProbeKind::TestTcp, ip)
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> String {
        serde_json::json!({ "cmd": self.cmd.as_str(), "ipaddr": self.ipaddr }).to_string()
    }
}
