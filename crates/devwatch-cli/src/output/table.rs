//! Table-formatted output for CLI.

use chrono::{DateTime, Utc};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use devwatch_core::protocol::ProbeKind;
use devwatch_core::DeviceRecord;

use super::OutputFormatter;

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }

    fn seen_cell(last_alive: Option<DateTime<Utc>>) -> Cell {
        let Some(at) = last_alive else {
            return Cell::new("-");
        };

        let secs = (Utc::now() - at).num_seconds().max(0);
        let cell = Cell::new(format!("{}s ago", secs));
        if secs < 5 {
            cell.fg(Color::Green)
        } else {
            cell.fg(Color::Yellow)
        }
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_devices(&self, devices: &[DeviceRecord]) -> String {
        if devices.is_empty() {
            return "No devices found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Name", "UUID", "IP", "Last Seen"]);

        for device in devices {
            table.add_row(vec![
                Cell::new(device.name().unwrap_or("-")),
                Cell::new(&device.uuid),
                Cell::new(device.ipaddr.as_deref().unwrap_or("-")),
                Self::seen_cell(device.last_alive),
            ]);
        }

        format!("{}\n\nFound {} device(s)", table, devices.len())
    }

    fn format_targets(&self, targets: &[String]) -> String {
        if targets.is_empty() {
            return "No probe targets.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["#", "Address"]);

        for (i, ip) in targets.iter().enumerate() {
            table.add_row(vec![Cell::new(i + 1), Cell::new(ip)]);
        }

        table.to_string()
    }

    fn format_probe(&self, ip: &str, kind: ProbeKind) -> String {
        format!("{} sent {} to {}", "[OK]".green(), kind.as_str(), ip)
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}
