//! Parsing of inbound device reports.
//!
//! Reports are validated here; anything that does not carry a usable identity
//! is rejected so the registry only ever sees well-formed records.

use log::warn;
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::types::{DeviceRecord, DeviceReport};

/// Parse one text frame from the discovery agent into a report.
pub fn parse_report(data: &str) -> Result<DeviceReport, TransportError> {
    let json: Value = serde_json::from_str(data)
        .map_err(|e| TransportError::InvalidReport(format!("not JSON: {}", e)))?;

    let Value::Object(mut fields) = json else {
        return Err(TransportError::InvalidReport(
            "report is not an object".to_string(),
        ));
    };

    let alive = match fields.remove("alive") {
        Some(Value::Bool(alive)) => alive,
        Some(other) => {
            return Err(TransportError::InvalidReport(format!(
                "alive must be a boolean, got {}",
                other
            )))
        }
        None => return Err(TransportError::InvalidReport("missing alive".to_string())),
    };

    let record = record_from_fields(fields).map_err(TransportError::InvalidReport)?;

    Ok(DeviceReport { record, alive })
}

/// Convert relay listing entries into records, dropping entries without an identity.
pub fn parse_relay_devices(entries: Vec<Value>) -> Vec<DeviceRecord> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(fields) => match record_from_fields(fields) {
                Ok(record) => Some(record),
                Err(reason) => {
                    warn!("Dropping relay entry: {}", reason);
                    None
                }
            },
            other => {
                warn!("Dropping relay entry that is not an object: {}", other);
                None
            }
        })
        .collect()
}

fn record_from_fields(mut fields: Map<String, Value>) -> Result<DeviceRecord, String> {
    let uuid = match fields.remove("uuid") {
        Some(Value::String(uuid)) if !uuid.trim().is_empty() => uuid,
        Some(_) => return Err("uuid must be a non-empty string".to_string()),
        None => return Err("missing uuid".to_string()),
    };

    let ipaddr = match fields.remove("ipaddr") {
        Some(Value::String(ip)) if ip.trim().is_empty() => None,
        Some(Value::String(ip)) => Some(ip.trim().to_string()),
        Some(Value::Null) | None => None,
        Some(other) => return Err(format!("ipaddr must be a string, got {}", other)),
    };

    // Freshness is stamped by the registry, never taken from the sender.
    fields.remove("lastAlive");

    Ok(DeviceRecord {
        uuid,
        ipaddr,
        last_alive: None,
        attributes: fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alive_report() {
        let json = r#"{
            "uuid": "A",
            "ipaddr": "10.0.0.5",
            "alive": true,
            "name": "Laser",
            "st_id": 16,
            "st_prog": 0.5
        }"#;

        let report = parse_report(json).unwrap();

        assert!(report.alive);
        assert_eq!(report.record.uuid, "A");
        assert_eq!(report.record.ipaddr.as_deref(), Some("10.0.0.5"));
        assert_eq!(report.record.name(), Some("Laser"));
        assert_eq!(report.record.attribute("st_id"), Some(&Value::from(16)));
        assert!(report.record.attribute("alive").is_none());
    }

    #[test]
    fn test_parse_gone_report() {
        let report = parse_report(r#"{"uuid": "A", "ipaddr": "10.0.0.5", "alive": false}"#).unwrap();
        assert!(!report.alive);
    }

    #[test]
    fn test_parse_report_invalid_json() {
        assert!(parse_report("not valid json").is_err());
        assert!(parse_report("[1, 2]").is_err());
    }

    #[test]
    fn test_parse_report_rejects_missing_identity() {
        assert!(parse_report(r#"{"ipaddr": "10.0.0.5", "alive": true}"#).is_err());
        assert!(parse_report(r#"{"uuid": "", "alive": true}"#).is_err());
        assert!(parse_report(r#"{"uuid": 7, "alive": true}"#).is_err());
    }

    #[test]
    fn test_parse_report_rejects_bad_fields() {
        assert!(parse_report(r#"{"uuid": "A", "alive": "yes"}"#).is_err());
        assert!(parse_report(r#"{"uuid": "A"}"#).is_err());
        assert!(parse_report(r#"{"uuid": "A", "ipaddr": 5, "alive": true}"#).is_err());
    }

    #[test]
    fn test_sender_last_alive_is_ignored() {
        let report =
            parse_report(r#"{"uuid": "A", "alive": true, "lastAlive": 1234}"#).unwrap();
        assert!(report.record.last_alive.is_none());
        assert!(report.record.attribute("lastAlive").is_none());
    }

    #[test]
    fn test_parse_relay_devices_drops_invalid_entries() {
        let entries: Vec<Value> = serde_json::from_str(
            r#"[{"uuid": "B", "name": "Remote"}, {"name": "anonymous"}, 42]"#,
        )
        .unwrap();

        let records = parse_relay_devices(entries);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uuid, "B");
        assert!(records[0].ipaddr.is_none());
    }
}
