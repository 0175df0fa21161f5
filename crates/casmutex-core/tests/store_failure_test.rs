//! Behaviour when the store misbehaves or uses unusual version tokens

mod common;

use std::sync::Arc;
use std::time::Duration;

use casmutex_core::{
    CancelSignal, CoordinatorConfig, KeyValueStore, Lifetime, MemoryStore, MutexCoordinator,
    MutexError, Timeout,
};
use common::{FlakyStore, TombstoneStore};
use tokio::time::Instant;

fn flaky_coordinator(max_failures: u32) -> MutexCoordinator<FlakyStore<MemoryStore>> {
    let config = CoordinatorConfig::new("a").with_max_store_failures(max_failures);
    MutexCoordinator::new(FlakyStore::new(MemoryStore::new()), config).unwrap()
}

// ============== Transport failures ==============

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let coordinator = flaky_coordinator(5);
    coordinator.store().fail_next(3);

    assert!(coordinator.acquire_millis("job", 1000, -1).await.unwrap());
    assert!(coordinator.owns("job"));

    let stats = coordinator.stats();
    assert_eq!(stats.store_errors, 3);
    assert_eq!(stats.acquisitions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failures_abort_acquisition() {
    let coordinator = flaky_coordinator(4);
    coordinator.store().fail_always();

    let started = Instant::now();
    let result = coordinator
        .acquire("job", Timeout::Infinite, Lifetime::INFINITE)
        .await;

    match result {
        Err(MutexError::StoreUnavailable { name, attempts, .. }) => {
            assert_eq!(name, "job");
            assert_eq!(attempts, 4);
        }
        other => panic!("expected StoreUnavailable, got {:?}", other),
    }
    // Three pauses between four failing attempts
    assert_eq!(started.elapsed(), Duration::from_millis(150));
    assert!(!coordinator.owns("job"));
    assert_eq!(coordinator.stats().aborted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unlimited_failures_fall_back_to_timeout() {
    let coordinator = flaky_coordinator(0);
    coordinator.store().fail_always();

    let acquired = coordinator.acquire_millis("job", 300, -1).await.unwrap();
    assert!(!acquired);
    assert!(coordinator.stats().store_errors >= 6);
    assert_eq!(coordinator.stats().timeouts, 1);
}

#[tokio::test]
async fn test_release_store_failure_still_detaches() {
    let coordinator = flaky_coordinator(5);
    assert!(coordinator.acquire_millis("job", 0, -1).await.unwrap());

    coordinator.store().fail_next(1);
    coordinator.release("job").await;

    assert!(!coordinator.owns("job"));
    assert!(coordinator.record("job").unwrap().version().is_none());
    assert_eq!(coordinator.stats().store_errors, 1);
    assert_eq!(coordinator.stats().releases, 0);
}

// ============== Opaque string tokens with tombstones ==============

#[tokio::test]
async fn test_tombstoned_key_is_claimed_with_cas() {
    let store = Arc::new(TombstoneStore::new());
    let a = MutexCoordinator::new(store.clone(), CoordinatorConfig::new("a")).unwrap();
    let b = MutexCoordinator::new(store.clone(), CoordinatorConfig::new("b")).unwrap();

    assert!(a.acquire_millis("job-42", 0, 5000).await.unwrap());
    let a_token = a.record("job-42").unwrap().version().cloned().unwrap();
    assert!(!b.acquire_millis("job-42", 0, 5000).await.unwrap());

    a.release("job-42").await;
    let tombstone = store.read("casmutex-job-42").await.unwrap();
    assert!(!tombstone.is_present());
    assert!(tombstone.version.is_some());

    // add-if-absent would fail on the tombstone; only the CAS path succeeds
    assert!(b.acquire_millis("job-42", 0, 5000).await.unwrap());
    let b_token = b.record("job-42").unwrap().version().cloned().unwrap();
    assert_ne!(a_token, b_token);
    assert!(store.read("casmutex-job-42").await.unwrap().holds("b"));
}

#[tokio::test]
async fn test_tombstone_store_stale_release() {
    let store = Arc::new(TombstoneStore::new());
    let a = MutexCoordinator::new(store.clone(), CoordinatorConfig::new("a")).unwrap();

    assert!(a.acquire_millis("job", 0, -1).await.unwrap());
    let token = a.record("job").unwrap().version().cloned().unwrap();

    // Someone else vacates and rewrites the key
    assert!(store.remove_if_version("casmutex-job", &token).await.unwrap());
    let tombstone = store.read("casmutex-job").await.unwrap().version.unwrap();
    assert!(store
        .compare_and_swap("casmutex-job", "intruder", &tombstone, Default::default())
        .await
        .unwrap());

    a.release("job").await;
    assert_eq!(a.stats().stale_releases, 1);
    assert!(store.read("casmutex-job").await.unwrap().holds("intruder"));
}

// ============== Cancellation ==============

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_infinite_wait() {
    let store = MemoryStore::new();
    let holder = MutexCoordinator::new(store.clone(), CoordinatorConfig::new("holder")).unwrap();
    let waiter =
        Arc::new(MutexCoordinator::new(store.clone(), CoordinatorConfig::new("waiter")).unwrap());
    assert!(holder.acquire_millis("job", 0, -1).await.unwrap());

    let cancel = CancelSignal::new();
    let task = {
        let waiter = waiter.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            waiter
                .acquire_with_cancel("job", Timeout::Infinite, Lifetime::INFINITE, &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(MutexError::Cancelled { ref name }) if name == "job"));
    assert!(!waiter.owns("job"));
    assert_eq!(waiter.stats().cancelled, 1);
    assert!(holder.owns("job"));
}

#[tokio::test]
async fn test_cancelled_signal_skips_store() {
    let store = MemoryStore::new();
    let coordinator = MutexCoordinator::new(store.clone(), CoordinatorConfig::new("a")).unwrap();

    let cancel = CancelSignal::new();
    cancel.cancel();

    let result = coordinator
        .acquire_with_cancel("job", Timeout::Infinite, Lifetime::INFINITE, &cancel)
        .await;
    assert!(matches!(result, Err(MutexError::Cancelled { .. })));
    assert_eq!(coordinator.stats().attempts, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_cancel_does_not_affect_owned_lock() {
    let store = MemoryStore::new();
    let coordinator = MutexCoordinator::new(store, CoordinatorConfig::new("a")).unwrap();
    assert!(coordinator.acquire_millis("job", 0, -1).await.unwrap());

    let cancel = CancelSignal::new();
    cancel.cancel();
    let result = coordinator
        .acquire_with_cancel("job", Timeout::Infinite, Lifetime::INFINITE, &cancel)
        .await;
    assert!(result.unwrap());
}
