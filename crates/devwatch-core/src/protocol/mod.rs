//! Protocol layer for the local discovery agent.
//!
//! This module builds outbound probe commands and parses inbound device reports.

pub mod commands;
pub mod report;

pub use commands::{ProbeCommand, ProbeKind};
pub use report::{parse_relay_devices, parse_report};
