//! JSON-formatted output for CLI.

use devwatch_core::protocol::ProbeKind;
use devwatch_core::DeviceRecord;
use serde::Serialize;
use serde_json::json;

use super::OutputFormatter;

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_devices(&self, devices: &[DeviceRecord]) -> String {
        Self::to_json(&json!({
            "devices": devices,
            "count": devices.len()
        }))
    }

    fn format_targets(&self, targets: &[String]) -> String {
        Self::to_json(&json!({
            "targets": targets,
            "count": targets.len()
        }))
    }

    fn format_probe(&self, ip: &str, kind: ProbeKind) -> String {
        Self::to_json(&json!({
            "ipaddr": ip,
            "cmd": kind,
            "sent": true
        }))
    }

    fn format_message(&self, message: &str) -> String {
        Self::to_json(&json!({ "message": message }))
    }
}
