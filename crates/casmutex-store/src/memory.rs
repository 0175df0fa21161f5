// In-memory versioned key-value store
// Every successful write takes a fresh value from a global index counter,
// so versions are unique and strictly increasing across all keys.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::trace;

use crate::error::StoreResult;
use crate::model::{StoreTtl, Versioned};
use crate::traits::KeyValueStore;

struct StoredEntry {
    value: String,
    version: u64,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with atomic add, compare-and-swap and delete-if-version.
///
/// Expired entries are evicted lazily when touched. Cloning shares the
/// underlying map, so clones behave as handles onto one store.
#[derive(Clone)]
pub struct MemoryStore {
    store: Arc<DashMap<String, StoredEntry>>,
    index: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            index: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_index(&self) -> u64 {
        self.index.fetch_add(1, Ordering::SeqCst)
    }

    /// Highest version handed out so far (0 before the first write)
    pub fn current_version(&self) -> u64 {
        self.index.load(Ordering::SeqCst) - 1
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.store
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn new_entry(&self, value: &str, ttl: StoreTtl, now: Instant) -> StoredEntry {
        StoredEntry {
            value: value.to_string(),
            version: self.next_index(),
            expires_at: ttl.as_duration().map(|d| now + d),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    type Version = u64;

    async fn read(&self, key: &str) -> StoreResult<Versioned<u64>> {
        let now = Instant::now();

        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired(now) {
                return Ok(Versioned::present(entry.value.clone(), entry.version));
            }
        } else {
            return Ok(Versioned::absent());
        }

        // Expired: evict unless a writer replaced it in the meantime
        if self
            .store
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            trace!(key, "Evicted expired entry");
        }
        Ok(Versioned::absent())
    }

    async fn add(&self, key: &str, value: &str, ttl: StoreTtl) -> StoreResult<bool> {
        let now = Instant::now();

        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(self.new_entry(value, ttl, now));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.new_entry(value, ttl, now));
                Ok(true)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &u64,
        ttl: StoreTtl,
    ) -> StoreResult<bool> {
        let now = Instant::now();

        let Some(mut entry) = self.store.get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired(now) || entry.version != *expected {
            return Ok(false);
        }

        entry.value = value.to_string();
        entry.version = self.next_index();
        entry.expires_at = ttl.as_duration().map(|d| now + d);
        Ok(true)
    }

    async fn remove_if_version(&self, key: &str, expected: &u64) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .store
            .remove_if(key, |_, entry| {
                !entry.is_expired(now) && entry.version == *expected
            })
            .is_some())
    }
}
