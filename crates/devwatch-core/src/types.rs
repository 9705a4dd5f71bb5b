//! Type definitions shared by the registry, transport and relay layers.
//!
//! Device attributes beyond identity and address are opaque to the registry;
//! they are carried in a flattened JSON map and passed through unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One physical or virtual device as currently known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Stable unique identity, the merge key
    pub uuid: String,
    /// Current network address (absent for relay-only records)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddr: Option<String>,
    /// Time of the most recent confirming report
    #[serde(
        default,
        rename = "lastAlive",
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_alive: Option<DateTime<Utc>>,
    /// Device-reported attributes (name, status code, serial, firmware, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl DeviceRecord {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ipaddr: None,
            last_alive: None,
            attributes: Map::new(),
        }
    }

    pub fn with_ipaddr(mut self, ip: impl Into<String>) -> Self {
        self.ipaddr = Some(ip.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Human readable name, if the device reported one.
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    /// Look up an opaque attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A device report from the local discovery agent.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub record: DeviceRecord,
    /// `false` means the device announced it is going away
    pub alive: bool,
}

/// Response body of the relay service's device listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayListing {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}
