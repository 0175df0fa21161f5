//! Mutex coordinator
//!
//! Implements acquire, release and ownership checks for named locks on top
//! of a `KeyValueStore`. Each lock name maps to one store key
//! (`key_prefix + name`) whose value is the owner id of the current holder.
//!
//! Acquisition is a polling loop: read the key, claim it with add-if-absent
//! or compare-and-swap when it is free, read it back to confirm the claim,
//! then either return or sleep and retry until the timeout runs out.
//! Ownership expiry is judged purely from the local clock; the store TTL is
//! only there so a crashed holder eventually frees the key.

use std::fmt::Debug;
use std::sync::Arc;

use casmutex_store::{KeyValueStore, StoreResult, StoreTtl};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::config::CoordinatorConfig;
use crate::error::{MutexError, Result};
use crate::model::{Lifetime, LockRecord, LockSnapshot, Timeout};
use crate::stats::{LockStats, StatsCollector};
use crate::table::{LockSlot, LockTable};

/// One participant in the distributed lock namespace.
///
/// Re-acquiring a lock this coordinator already owns succeeds immediately
/// without touching the store. Separate coordinators never share that
/// shortcut, even inside one process, so mutual exclusion between tasks of
/// the same process needs one coordinator per task.
pub struct MutexCoordinator<S: KeyValueStore> {
    store: S,
    config: CoordinatorConfig,
    table: LockTable<S::Version>,
    stats: StatsCollector,
}

impl<S: KeyValueStore> MutexCoordinator<S> {
    pub fn new(store: S, config: CoordinatorConfig) -> Result<Self> {
        Self::with_table(store, config, LockTable::new())
    }

    /// Create a coordinator around an existing record table. Every record in
    /// the table must carry this coordinator's owner id.
    pub fn with_table(
        store: S,
        config: CoordinatorConfig,
        table: LockTable<S::Version>,
    ) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;

        if !table.is_owned_by(&config.owner_id) {
            return Err(MutexError::InvalidConfig(format!(
                "record table contains records for an owner other than '{}'",
                config.owner_id
            )));
        }

        debug!(
            owner = %config.owner_id,
            prefix = %config.key_prefix,
            retry_interval_ms = config.retry_interval_ms,
            "Mutex coordinator created"
        );

        Ok(Self {
            store,
            config,
            table,
            stats: StatsCollector::default(),
        })
    }

    pub fn owner_id(&self) -> &str {
        &self.config.owner_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn table(&self) -> &LockTable<S::Version> {
        &self.table
    }

    /// Hand the record table over, e.g. to a replacement coordinator
    pub fn into_table(self) -> LockTable<S::Version> {
        self.table
    }

    /// Store key for a lock name
    pub fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.config.key_prefix, name)
    }

    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Whether this coordinator currently owns `name`.
    ///
    /// Local computation only: never contacts the store and never waits on an
    /// acquisition in progress.
    pub fn owns(&self, name: &str) -> bool {
        self.table
            .get(name)
            .is_some_and(|slot| slot.record.read().is_owned())
    }

    /// Copy of the local record for `name`
    pub fn record(&self, name: &str) -> Option<LockRecord<S::Version>> {
        self.table.record(name)
    }

    /// Diagnostic snapshot of the local record for `name`
    pub fn snapshot(&self, name: &str) -> Option<LockSnapshot> {
        self.table.get(name).map(|slot| slot.record.read().snapshot())
    }

    /// Diagnostic snapshots of every lock this coordinator has touched
    pub fn snapshots(&self) -> Vec<LockSnapshot> {
        self.table.snapshots()
    }

    /// Acquire using millisecond arguments; `-1` means infinite for both.
    ///
    /// Arguments are validated before any store interaction.
    pub async fn acquire_millis(&self, name: &str, ms_timeout: i64, ms_lifetime: i64) -> Result<bool> {
        let lifetime = Lifetime::from_millis(ms_lifetime)?;
        let timeout = Timeout::from_millis(ms_timeout)?;
        self.acquire(name, timeout, lifetime).await
    }

    /// Acquire `name`, retrying until `timeout` elapses.
    ///
    /// Returns `Ok(true)` once owned and `Ok(false)` on timeout. A zero
    /// timeout still makes one attempt.
    pub async fn acquire(&self, name: &str, timeout: Timeout, lifetime: Lifetime) -> Result<bool> {
        self.acquire_inner(name, timeout, lifetime, None).await
    }

    /// Like `acquire`, but aborts with `MutexError::Cancelled` when `cancel`
    /// fires while waiting.
    pub async fn acquire_with_cancel(
        &self,
        name: &str,
        timeout: Timeout,
        lifetime: Lifetime,
        cancel: &CancelSignal,
    ) -> Result<bool> {
        self.acquire_inner(name, timeout, lifetime, Some(cancel)).await
    }

    async fn acquire_inner(
        &self,
        name: &str,
        timeout: Timeout,
        lifetime: Lifetime,
        cancel: Option<&CancelSignal>,
    ) -> Result<bool> {
        lifetime.validate()?;

        if self.owns(name) {
            self.stats.record_reentrant();
            debug!(name, "Mutex already owned, re-entrant acquire");
            return Ok(true);
        }

        let slot = self.table.slot(name, &self.config.owner_id, lifetime);
        let _gate = slot.gate.lock().await;

        // Another call for this name may have finished while we waited
        {
            let mut record = slot.record.write();
            if record.is_owned() {
                drop(record);
                self.stats.record_reentrant();
                return Ok(true);
            }
            record.detach();
            record.set_lifetime(lifetime);
        }

        let key = self.key_for(name);
        let ttl = StoreTtl::from(lifetime);
        let started = Instant::now();
        let deadline = timeout.deadline_from(started);
        let mut attempt: u32 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            if let Some(signal) = cancel
                && signal.is_cancelled()
            {
                return Err(self.cancelled(name));
            }

            attempt += 1;
            self.stats.record_attempt();

            match self.try_claim(&key, ttl).await {
                Ok(Some(version)) => {
                    slot.record.write().attach(version, Instant::now());
                    self.stats.record_acquired(started.elapsed());
                    info!(name, key = %key, attempt, owner = %self.config.owner_id, "Mutex acquired");
                    return Ok(true);
                }
                Ok(None) => {
                    consecutive_failures = 0;
                    debug!(name, attempt, "Mutex held elsewhere");
                }
                Err(e) => {
                    consecutive_failures += 1;
                    self.stats.record_store_error();
                    warn!(
                        name,
                        attempt,
                        consecutive_failures,
                        error = %e,
                        "Store failure while acquiring mutex"
                    );

                    let limit = self.config.max_store_failures;
                    if limit > 0 && consecutive_failures >= limit {
                        self.stats.record_aborted();
                        return Err(MutexError::StoreUnavailable {
                            name: name.to_string(),
                            attempts: consecutive_failures,
                            source: e,
                        });
                    }
                }
            }

            let pause = match deadline {
                None => self.config.retry_interval(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.stats.record_timeout(started.elapsed());
                        debug!(name, attempt, "Mutex acquisition timed out");
                        return Ok(false);
                    }
                    self.config.retry_interval().min(deadline - now)
                }
            };

            match cancel {
                Some(signal) => {
                    tokio::select! {
                        biased;
                        _ = signal.cancelled() => return Err(self.cancelled(name)),
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                None => tokio::time::sleep(pause).await,
            }
        }
    }

    /// One read, claim, confirm round. Returns the version token when this
    /// coordinator ends up as the holder.
    async fn try_claim(&self, key: &str, ttl: StoreTtl) -> StoreResult<Option<S::Version>> {
        let owner = self.config.owner_id.as_str();
        let current = self.store.read(key).await?;

        match current.value.as_deref() {
            // Our own earlier claim, visible only now
            Some(holder) if holder == owner => return Ok(current.version),
            Some(_) => return Ok(None),
            None => {}
        }

        let claimed = match &current.version {
            None => self.store.add(key, owner, ttl).await?,
            Some(version) => {
                self.store
                    .compare_and_swap(key, owner, version, ttl)
                    .await?
            }
        };
        if !claimed {
            return Ok(None);
        }

        // A competing writer may have replaced our value before we look
        let confirm = self.store.read(key).await?;
        if confirm.holds(owner) {
            Ok(confirm.version)
        } else {
            Ok(None)
        }
    }

    /// Release `name` if this coordinator owns it.
    ///
    /// Removes the store key only if it still carries the version recorded at
    /// acquisition. A mismatch means the lock already expired and may belong
    /// to someone else; that and store failures are logged, not returned. The
    /// local record is detached either way.
    pub async fn release(&self, name: &str) {
        let Some(slot) = self.table.get(name) else {
            return;
        };
        let _gate = slot.gate.lock().await;

        let Some(version) = Self::owned_version(&slot) else {
            debug!(name, "Release ignored, mutex not owned");
            return;
        };

        let key = self.key_for(name);
        match self.store.remove_if_version(&key, &version).await {
            Ok(true) => {
                self.stats.record_released();
                info!(name, key = %key, "Mutex released");
            }
            Ok(false) => {
                self.stats.record_stale_release();
                warn!(name, key = %key, "Mutex key already expired or reclaimed on release");
            }
            Err(e) => {
                self.stats.record_store_error();
                warn!(name, key = %key, error = %e, "Store failure while releasing mutex");
            }
        }

        slot.record.write().detach();
    }

    fn owned_version(slot: &Arc<LockSlot<S::Version>>) -> Option<S::Version> {
        let record = slot.record.read();
        if record.is_owned() {
            record.version().cloned()
        } else {
            None
        }
    }

    fn cancelled(&self, name: &str) -> MutexError {
        self.stats.record_cancelled();
        info!(name, "Mutex acquisition cancelled");
        MutexError::Cancelled {
            name: name.to_string(),
        }
    }
}

impl<S> Debug for MutexCoordinator<S>
where
    S: KeyValueStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexCoordinator")
            .field("owner_id", &self.config.owner_id)
            .field("key_prefix", &self.config.key_prefix)
            .field("locks", &self.table.len())
            .finish()
    }
}
