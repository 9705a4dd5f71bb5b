//! Subscriber directory.
//!
//! Slots are keyed by id. Re-registering an id replaces the callback in its
//! existing slot, so delivery order stays the order of first registration.
//! Each registration carries a caller-assigned token; a token-scoped removal
//! only succeeds while the slot still holds that registration.

use std::collections::{BTreeMap, HashMap};

use crate::types::DeviceRecord;

/// Callback invoked with the merged device list.
pub type Callback = Box<dyn FnMut(&[DeviceRecord]) + Send + 'static>;

struct Slot {
    id: String,
    token: u64,
    callback: Callback,
}

#[derive(Default)]
pub struct SubscriberDirectory {
    slots: BTreeMap<u64, Slot>,
    by_id: HashMap<String, u64>,
    next_slot: u64,
}

impl SubscriberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the subscriber under `id`.
    pub fn register(&mut self, id: &str, token: u64, callback: Callback) {
        if let Some(slot) = self.by_id.get(id).and_then(|key| self.slots.get_mut(key)) {
            slot.callback = callback;
            slot.token = token;
            return;
        }

        let key = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(
            key,
            Slot {
                id: id.to_string(),
                token,
                callback,
            },
        );
        self.by_id.insert(id.to_string(), key);
    }

    /// Remove the slot for `id`. Unknown ids are ignored.
    pub fn unregister(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(key) => self.slots.remove(&key).is_some(),
            None => false,
        }
    }

    /// Remove the slot for `id` only if it still holds the given registration.
    pub fn unregister_token(&mut self, id: &str, token: u64) -> bool {
        let current = self
            .by_id
            .get(id)
            .and_then(|key| self.slots.get(key))
            .map(|slot| slot.token);

        if current == Some(token) {
            self.unregister(id)
        } else {
            false
        }
    }

    /// Deliver `devices` to every subscriber in registration order.
    pub fn broadcast(&mut self, devices: &[DeviceRecord]) {
        for slot in self.slots.values_mut() {
            (slot.callback)(devices);
        }
    }

    /// Deliver `devices` to a single subscriber.
    pub fn deliver(&mut self, id: &str, devices: &[DeviceRecord]) -> bool {
        match self.by_id.get(id).and_then(|key| self.slots.get_mut(key)) {
            Some(slot) => {
                (slot.callback)(devices);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.slots.values().map(|slot| slot.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
