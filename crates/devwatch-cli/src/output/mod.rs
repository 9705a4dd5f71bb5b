//! Output formatting for CLI results.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use devwatch_core::protocol::ProbeKind;
use devwatch_core::DeviceRecord;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format device list
    fn format_devices(&self, devices: &[DeviceRecord]) -> String;

    /// Format the probe target list
    fn format_targets(&self, targets: &[String]) -> String;

    /// Format the outcome of a single probe command
    fn format_probe(&self, ip: &str, kind: ProbeKind) -> String;

    /// Format a generic message
    fn format_message(&self, message: &str) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}
