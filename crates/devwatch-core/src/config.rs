//! Registry configuration.
//!
//! Every field has a default so a partial JSON file (or none at all) yields a
//! usable configuration. Durations are stored in milliseconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// WebSocket URL of the local discovery agent
    pub agent_url: String,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,

    /// Relay service base URL; relay polling is disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,
    pub relay_initial_delay_ms: u64,
    pub relay_poll_interval_ms: u64,
    pub relay_timeout_ms: u64,

    pub debounce_window_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Sweep period, also used as the liveness TTL
    pub sweep_interval_ms: u64,

    pub probe_interval_ms: u64,
    /// Run the round-robin probe rotation
    pub guessing_poke: bool,
    pub max_probe_targets: usize,
    pub default_probe_target: String,
    /// Placeholder address never recorded in the probe history
    pub history_excluded_host: String,
    pub lookup_hostname: String,
    pub probe_targets_key: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            agent_url: "ws://127.0.0.1:10000/ws/discover".to_string(),
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 5000,
            relay_url: None,
            relay_initial_delay_ms: 5000,
            relay_poll_interval_ms: 15000,
            relay_timeout_ms: 10000,
            debounce_window_ms: 100,
            heartbeat_interval_ms: 5000,
            sweep_interval_ms: 15000,
            probe_interval_ms: 1000,
            guessing_poke: true,
            max_probe_targets: 20,
            default_probe_target: "192.168.1.1".to_string(),
            history_excluded_host: "192.168.1.1".to_string(),
            lookup_hostname: "raspberrypi.local".to_string(),
            probe_targets_key: "poke-ip-addr".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
        let config: RegistryConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.agent_url.starts_with("ws://") || self.agent_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "agent_url must be a ws:// or wss:// URL, got '{}'",
                self.agent_url
            )));
        }

        let intervals = [
            ("debounce_window_ms", self.debounce_window_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("probe_interval_ms", self.probe_interval_ms),
            ("relay_poll_interval_ms", self.relay_poll_interval_ms),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("relay_timeout_ms", self.relay_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }

        if self.max_probe_targets == 0 {
            return Err(ConfigError::Invalid(
                "max_probe_targets must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn relay_initial_delay(&self) -> Duration {
        Duration::from_millis(self.relay_initial_delay_ms)
    }

    pub fn relay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.relay_poll_interval_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
