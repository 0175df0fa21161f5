//! Store test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use casmutex_core::{KeyValueStore, StoreError, StoreTtl, Versioned};
use casmutex_store::StoreResult;
use parking_lot::Mutex;

/// Counts every call made to the wrapped store
pub struct CountingStore<S> {
    inner: S,
    calls: Arc<AtomicUsize>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for CountingStore<S> {
    type Version = S::Version;

    async fn read(&self, key: &str) -> StoreResult<Versioned<S::Version>> {
        self.hit();
        self.inner.read(key).await
    }

    async fn add(&self, key: &str, value: &str, ttl: StoreTtl) -> StoreResult<bool> {
        self.hit();
        self.inner.add(key, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &S::Version,
        ttl: StoreTtl,
    ) -> StoreResult<bool> {
        self.hit();
        self.inner.compare_and_swap(key, value, expected, ttl).await
    }

    async fn remove_if_version(&self, key: &str, expected: &S::Version) -> StoreResult<bool> {
        self.hit();
        self.inner.remove_if_version(key, expected).await
    }
}

/// Fails calls with `StoreError::Unavailable` while failures are armed
pub struct FlakyStore<S> {
    inner: S,
    remaining_failures: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls
    pub fn fail_next(&self, n: usize) {
        self.remaining_failures.store(n, Ordering::SeqCst);
    }

    /// Fail every call from now on
    pub fn fail_always(&self) {
        self.remaining_failures.store(usize::MAX, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        let tripped = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if tripped {
            Err(StoreError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for FlakyStore<S> {
    type Version = S::Version;

    async fn read(&self, key: &str) -> StoreResult<Versioned<S::Version>> {
        self.check()?;
        self.inner.read(key).await
    }

    async fn add(&self, key: &str, value: &str, ttl: StoreTtl) -> StoreResult<bool> {
        self.check()?;
        self.inner.add(key, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &S::Version,
        ttl: StoreTtl,
    ) -> StoreResult<bool> {
        self.check()?;
        self.inner.compare_and_swap(key, value, expected, ttl).await
    }

    async fn remove_if_version(&self, key: &str, expected: &S::Version) -> StoreResult<bool> {
        self.check()?;
        self.inner.remove_if_version(key, expected).await
    }
}

/// Store with random string version tokens that never deletes: removal
/// leaves a tombstone with a fresh token, and `add` refuses any key that has
/// an entry at all. TTLs are ignored.
#[derive(Default)]
pub struct TombstoneStore {
    entries: Mutex<HashMap<String, (Option<String>, String)>>,
}

impl TombstoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn token() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl KeyValueStore for TombstoneStore {
    type Version = String;

    async fn read(&self, key: &str) -> StoreResult<Versioned<String>> {
        let entries = self.entries.lock();
        Ok(match entries.get(key) {
            Some((Some(value), token)) => Versioned::present(value.clone(), token.clone()),
            Some((None, token)) => Versioned::tombstone(token.clone()),
            None => Versioned::absent(),
        })
    }

    async fn add(&self, key: &str, value: &str, _ttl: StoreTtl) -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (Some(value.to_string()), Self::token()));
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &String,
        _ttl: StoreTtl,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.1 == *expected => {
                *entry = (Some(value.to_string()), Self::token());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_if_version(&self, key: &str, expected: &String) -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.0.is_some() && entry.1 == *expected => {
                *entry = (None, Self::token());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Lets every successful claim land, then immediately overwrites it with
/// `rival`'s id, as if a competing writer won between claim and confirm.
pub struct HijackingStore<S> {
    inner: S,
    rival: String,
    hijacks: AtomicUsize,
}

impl<S: KeyValueStore> HijackingStore<S> {
    pub fn new(inner: S, rival: impl Into<String>) -> Self {
        Self {
            inner,
            rival: rival.into(),
            hijacks: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn hijacks(&self) -> usize {
        self.hijacks.load(Ordering::SeqCst)
    }

    async fn overwrite(&self, key: &str, ttl: StoreTtl) -> StoreResult<()> {
        let current = self.inner.read(key).await?;
        if let Some(version) = current.version
            && self
                .inner
                .compare_and_swap(key, &self.rival, &version, ttl)
                .await?
        {
            self.hijacks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for HijackingStore<S> {
    type Version = S::Version;

    async fn read(&self, key: &str) -> StoreResult<Versioned<S::Version>> {
        self.inner.read(key).await
    }

    async fn add(&self, key: &str, value: &str, ttl: StoreTtl) -> StoreResult<bool> {
        let added = self.inner.add(key, value, ttl).await?;
        if added {
            self.overwrite(key, ttl).await?;
        }
        Ok(added)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &S::Version,
        ttl: StoreTtl,
    ) -> StoreResult<bool> {
        let swapped = self.inner.compare_and_swap(key, value, expected, ttl).await?;
        if swapped {
            self.overwrite(key, ttl).await?;
        }
        Ok(swapped)
    }

    async fn remove_if_version(&self, key: &str, expected: &S::Version) -> StoreResult<bool> {
        self.inner.remove_if_version(key, expected).await
    }
}
