// Per-coordinator lock record table
// One slot per lock name; slots are created on first use and never removed.

use std::fmt::Debug;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::model::{Lifetime, LockRecord, LockSnapshot};

/// A lock name's record plus the gate that serializes acquire/release calls
/// for that name. The record lock is only ever held briefly and never across
/// a store call, so ownership checks do not wait on the network.
pub(crate) struct LockSlot<V> {
    pub(crate) gate: tokio::sync::Mutex<()>,
    pub(crate) record: RwLock<LockRecord<V>>,
}

/// Map from lock name to local lock record, owned by one coordinator
pub struct LockTable<V> {
    slots: DashMap<String, Arc<LockSlot<V>>>,
}

impl<V> LockTable<V> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Seed a record, e.g. when carrying bookkeeping over to a new
    /// coordinator with the same owner id. Replaces any existing record.
    pub fn insert(&self, record: LockRecord<V>) {
        let name = record.name().to_string();
        self.slots.insert(
            name,
            Arc::new(LockSlot {
                gate: tokio::sync::Mutex::new(()),
                record: RwLock::new(record),
            }),
        );
    }

    /// Whether every record in the table belongs to `owner_id`
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.value().record.read().owner_id() == owner_id)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<LockSlot<V>>> {
        self.slots.get(name).map(|slot| slot.value().clone())
    }

    pub(crate) fn slot(&self, name: &str, owner_id: &str, lifetime: Lifetime) -> Arc<LockSlot<V>> {
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(LockSlot {
                    gate: tokio::sync::Mutex::new(()),
                    record: RwLock::new(LockRecord::new(name, owner_id, lifetime)),
                })
            })
            .value()
            .clone()
    }
}

impl<V: Clone> LockTable<V> {
    /// Copy of the record for `name`
    pub fn record(&self, name: &str) -> Option<LockRecord<V>> {
        self.get(name).map(|slot| slot.record.read().clone())
    }
}

impl<V: Debug> LockTable<V> {
    /// Snapshots of all records, sorted by name
    pub fn snapshots(&self) -> Vec<LockSnapshot> {
        let mut snapshots: Vec<LockSnapshot> = self
            .slots
            .iter()
            .map(|slot| slot.value().record.read().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl<V> Default for LockTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
