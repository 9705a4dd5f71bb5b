//! Device registry: the two source tables and the merged view.
//!
//! The registry is a plain owned struct with no interior locking. Time is
//! passed in by the caller so the liveness rules can be exercised without
//! waiting on a real clock.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::types::DeviceRecord;

/// A source table keyed by uuid, with the instant of the last confirming report.
pub type SourceTable = HashMap<String, (DeviceRecord, Instant)>;

/// Turns the merged map into the public ordering.
pub type Normalizer = fn(&HashMap<String, DeviceRecord>) -> Vec<DeviceRecord>;

/// Which table wins when both hold the same uuid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    #[default]
    DirectFirst,
    RelayFirst,
}

/// Merge both tables into one map keyed by uuid.
pub fn merge(
    direct: &SourceTable,
    relay: &SourceTable,
    precedence: Precedence,
) -> HashMap<String, DeviceRecord> {
    let (low, high) = match precedence {
        Precedence::DirectFirst => (relay, direct),
        Precedence::RelayFirst => (direct, relay),
    };

    let mut merged: HashMap<String, DeviceRecord> = low
        .iter()
        .map(|(uuid, (record, _))| (uuid.clone(), record.clone()))
        .collect();

    for (uuid, (record, _)) in high {
        merged.insert(uuid.clone(), record.clone());
    }

    merged
}

/// Default ordering: by device name (case-insensitive), then uuid.
pub fn normalize_by_name(merged: &HashMap<String, DeviceRecord>) -> Vec<DeviceRecord> {
    let mut list: Vec<DeviceRecord> = merged.values().cloned().collect();
    list.sort_by(|a, b| {
        let a_name = a.name().unwrap_or_default().to_lowercase();
        let b_name = b.name().unwrap_or_default().to_lowercase();
        a_name.cmp(&b_name).then_with(|| a.uuid.cmp(&b.uuid))
    });
    list
}

/// Drop entries whose last report is `ttl` or more in the past.
///
/// Returns the number of entries removed.
pub fn prune_stale_devices(devices: &mut SourceTable, now: Instant, ttl: Duration) -> usize {
    let before = devices.len();
    devices.retain(|_, (_, last_alive)| now.saturating_duration_since(*last_alive) < ttl);
    before - devices.len()
}

/// The authoritative table of known devices.
pub struct DeviceRegistry {
    direct: SourceTable,
    relay: SourceTable,
    precedence: Precedence,
    normalize: Normalizer,
    merged: Vec<DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new(normalize: Normalizer) -> Self {
        Self {
            direct: HashMap::new(),
            relay: HashMap::new(),
            precedence: Precedence::DirectFirst,
            normalize,
            merged: Vec::new(),
        }
    }

    /// Upsert (alive) or remove (gone) a directly-probed device.
    pub fn apply_direct(&mut self, mut record: DeviceRecord, alive: bool, now: Instant) {
        if alive {
            record.last_alive = Some(Utc::now());
            self.direct.insert(record.uuid.clone(), (record, now));
        } else {
            self.direct.remove(&record.uuid);
        }
        self.recompute();
    }

    /// Replace the relay table wholesale.
    pub fn apply_relay(&mut self, records: Vec<DeviceRecord>, now: Instant) {
        let stamp = Utc::now();
        self.relay = records
            .into_iter()
            .map(|mut record| {
                record.last_alive = Some(stamp);
                (record.uuid.clone(), (record, now))
            })
            .collect();
        self.recompute();
    }

    /// Evict entries not refreshed within `ttl`. Returns true if anything was removed.
    pub fn sweep_stale(&mut self, now: Instant, ttl: Duration) -> bool {
        let removed = prune_stale_devices(&mut self.direct, now, ttl)
            + prune_stale_devices(&mut self.relay, now, ttl);
        self.recompute();
        removed > 0
    }

    /// Current merged, normalized view.
    pub fn snapshot(&self) -> &[DeviceRecord] {
        &self.merged
    }

    /// Point lookup honouring table precedence.
    pub fn lookup(&self, uuid: &str) -> Option<&DeviceRecord> {
        let direct = self.direct.get(uuid).map(|(record, _)| record);
        let relay = self.relay.get(uuid).map(|(record, _)| record);
        match self.precedence {
            Precedence::DirectFirst => direct.or(relay),
            Precedence::RelayFirst => relay.or(direct),
        }
    }

    pub fn direct_count(&self) -> usize {
        self.direct.len()
    }

    /// Merged map with precedence applied, keyed by uuid.
    pub fn merged_map(&self) -> HashMap<String, DeviceRecord> {
        merge(&self.direct, &self.relay, self.precedence)
    }

    fn recompute(&mut self) {
        self.merged = (self.normalize)(&self.merged_map());
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(normalize_by_name)
    }
}
