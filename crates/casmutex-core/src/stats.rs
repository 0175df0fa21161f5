// Lock statistics
// In-process counters for inspection, mirrored onto the `metrics` facade so
// an installed exporter sees the same numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::{Deserialize, Serialize};

const ACQUIRE_TOTAL: &str = "casmutex_acquire_total";
const ACQUIRE_WAIT_SECONDS: &str = "casmutex_acquire_wait_seconds";
const RELEASE_TOTAL: &str = "casmutex_release_total";
const STORE_ERRORS_TOTAL: &str = "casmutex_store_errors_total";

/// Register metric descriptions. Call once at startup, after installing a
/// recorder.
pub fn describe_metrics() {
    describe_counter!(
        ACQUIRE_TOTAL,
        "Mutex acquisitions by outcome (acquired, reentrant, timeout, cancelled, store_error)"
    );
    describe_histogram!(
        ACQUIRE_WAIT_SECONDS,
        "Time spent in the acquisition loop before acquiring or giving up"
    );
    describe_counter!(
        RELEASE_TOTAL,
        "Mutex releases by outcome (released, stale, store_error)"
    );
    describe_counter!(
        STORE_ERRORS_TOTAL,
        "Store operations that failed during acquire or release"
    );
}

/// Point-in-time copy of a coordinator's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    /// Acquisitions that went through the store
    pub acquisitions: u64,
    /// Acquisitions satisfied locally by an owned record
    pub reentrant_acquisitions: u64,
    /// Acquisitions that ran out of time
    pub timeouts: u64,
    /// Acquisitions aborted by a cancel signal
    pub cancelled: u64,
    /// Acquisitions aborted after repeated store failures
    pub aborted: u64,
    /// Read/claim/confirm rounds issued against the store
    pub attempts: u64,
    /// Individual store operation failures
    pub store_errors: u64,
    /// Releases that removed the key
    pub releases: u64,
    /// Releases whose version no longer matched the store
    pub stale_releases: u64,
}

#[derive(Default)]
pub(crate) struct StatsCollector {
    acquisitions: AtomicU64,
    reentrant_acquisitions: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    aborted: AtomicU64,
    attempts: AtomicU64,
    store_errors: AtomicU64,
    releases: AtomicU64,
    stale_releases: AtomicU64,
}

impl StatsCollector {
    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acquired(&self, waited: Duration) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        counter!(ACQUIRE_TOTAL, "outcome" => "acquired").increment(1);
        histogram!(ACQUIRE_WAIT_SECONDS).record(waited.as_secs_f64());
    }

    pub(crate) fn record_reentrant(&self) {
        self.reentrant_acquisitions.fetch_add(1, Ordering::Relaxed);
        counter!(ACQUIRE_TOTAL, "outcome" => "reentrant").increment(1);
    }

    pub(crate) fn record_timeout(&self, waited: Duration) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        counter!(ACQUIRE_TOTAL, "outcome" => "timeout").increment(1);
        histogram!(ACQUIRE_WAIT_SECONDS).record(waited.as_secs_f64());
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        counter!(ACQUIRE_TOTAL, "outcome" => "cancelled").increment(1);
    }

    pub(crate) fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
        counter!(ACQUIRE_TOTAL, "outcome" => "store_error").increment(1);
    }

    pub(crate) fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
        counter!(STORE_ERRORS_TOTAL).increment(1);
    }

    pub(crate) fn record_released(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        counter!(RELEASE_TOTAL, "outcome" => "released").increment(1);
    }

    pub(crate) fn record_stale_release(&self) {
        self.stale_releases.fetch_add(1, Ordering::Relaxed);
        counter!(RELEASE_TOTAL, "outcome" => "stale").increment(1);
    }

    pub(crate) fn snapshot(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            reentrant_acquisitions: self.reentrant_acquisitions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            stale_releases: self.stale_releases.load(Ordering::Relaxed),
        }
    }
}
