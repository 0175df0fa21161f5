//! The key-value capability consumed by the mutex coordinator

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{StoreTtl, Versioned};

/// Versioned key-value store.
///
/// Every successful write must produce a new version, and the conditional
/// operations must be atomic with respect to each other. Losing a race is
/// reported as `Ok(false)`; `Err` is reserved for the store failing to
/// answer at all.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Opaque version token, comparable only by the store itself
    type Version: Clone + Eq + Debug + Send + Sync + 'static;

    /// Atomic snapshot of the key's value and version
    async fn read(&self, key: &str) -> StoreResult<Versioned<Self::Version>>;

    /// Create the key only if it does not exist
    async fn add(&self, key: &str, value: &str, ttl: StoreTtl) -> StoreResult<bool>;

    /// Overwrite the key only if its current version equals `expected`
    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &Self::Version,
        ttl: StoreTtl,
    ) -> StoreResult<bool>;

    /// Remove the key only if its current version equals `expected`
    async fn remove_if_version(&self, key: &str, expected: &Self::Version) -> StoreResult<bool>;
}

#[async_trait]
impl<S> KeyValueStore for std::sync::Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    type Version = S::Version;

    async fn read(&self, key: &str) -> StoreResult<Versioned<Self::Version>> {
        (**self).read(key).await
    }

    async fn add(&self, key: &str, value: &str, ttl: StoreTtl) -> StoreResult<bool> {
        (**self).add(key, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: &str,
        expected: &Self::Version,
        ttl: StoreTtl,
    ) -> StoreResult<bool> {
        (**self).compare_and_swap(key, value, expected, ttl).await
    }

    async fn remove_if_version(&self, key: &str, expected: &Self::Version) -> StoreResult<bool> {
        (**self).remove_if_version(key, expected).await
    }
}
