//! `contend`: several coordinators hammering one lock name

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use casmutex_core::{
    CancelSignal, CoordinatorConfig, Lifetime, LockStats, MemoryStore, MutexCoordinator, Timeout,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::model::ContendArgs;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerReport {
    pub owner_id: String,
    pub acquired: usize,
    pub timed_out: usize,
    pub stats: LockStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContendReport {
    pub lock: String,
    pub workers: usize,
    pub rounds: usize,
    pub acquired: usize,
    pub timed_out: usize,
    /// Times a worker entered its critical section while another was inside
    pub overlaps: usize,
    pub elapsed_ms: u64,
    pub per_worker: Vec<WorkerReport>,
}

/// Shared critical-section occupancy counter
#[derive(Default)]
struct Occupancy {
    inside: AtomicUsize,
    overlaps: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) {
        if self.inside.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run `args.workers` coordinators, each with its own owner id, against one
/// shared in-memory store.
///
/// Overlaps are reported, not treated as errors; with a finite lifetime
/// shorter than `hold_ms` they are expected.
pub async fn run_contend(
    base: &CoordinatorConfig,
    args: &ContendArgs,
    cancel: &CancelSignal,
) -> anyhow::Result<ContendReport> {
    if args.workers == 0 {
        anyhow::bail!("--workers must be at least 1");
    }
    let timeout = Timeout::from_millis(args.timeout_ms)?;
    let lifetime = Lifetime::from_millis(args.lifetime_ms)?;

    let store = MemoryStore::new();
    let occupancy = Arc::new(Occupancy::default());
    let started = Instant::now();

    info!(
        lock = %args.lock,
        workers = args.workers,
        rounds = args.rounds,
        "Starting contention run"
    );

    let handles: Vec<_> = (0..args.workers)
        .map(|i| {
            let config = CoordinatorConfig {
                owner_id: format!("{}-worker-{}", base.owner_id, i),
                ..base.clone()
            };
            let store = store.clone();
            let occupancy = occupancy.clone();
            let cancel = cancel.clone();
            let lock = args.lock.clone();
            let rounds = args.rounds;
            let hold = Duration::from_millis(args.hold_ms);

            tokio::spawn(async move {
                let coordinator = MutexCoordinator::new(store, config)?;
                run_worker(&coordinator, &lock, rounds, hold, timeout, lifetime, &occupancy, &cancel)
                    .await
            })
        })
        .collect();

    let mut per_worker = Vec::with_capacity(handles.len());
    for result in futures::future::join_all(handles).await {
        per_worker.push(result.context("contention worker panicked")??);
    }

    let report = ContendReport {
        lock: args.lock.clone(),
        workers: args.workers,
        rounds: args.rounds,
        acquired: per_worker.iter().map(|w| w.acquired).sum(),
        timed_out: per_worker.iter().map(|w| w.timed_out).sum(),
        overlaps: occupancy.overlaps.load(Ordering::SeqCst),
        elapsed_ms: started.elapsed().as_millis() as u64,
        per_worker,
    };

    info!(
        acquired = report.acquired,
        timed_out = report.timed_out,
        overlaps = report.overlaps,
        elapsed_ms = report.elapsed_ms,
        "Contention run finished"
    );

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    coordinator: &MutexCoordinator<MemoryStore>,
    lock: &str,
    rounds: usize,
    hold: Duration,
    timeout: Timeout,
    lifetime: Lifetime,
    occupancy: &Occupancy,
    cancel: &CancelSignal,
) -> anyhow::Result<WorkerReport> {
    let mut acquired = 0;
    let mut timed_out = 0;

    for round in 0..rounds {
        if !coordinator
            .acquire_with_cancel(lock, timeout, lifetime, cancel)
            .await?
        {
            timed_out += 1;
            debug!(owner = coordinator.owner_id(), round, "Acquisition timed out");
            continue;
        }

        acquired += 1;
        occupancy.enter();
        tokio::time::sleep(hold).await;
        occupancy.leave();

        coordinator.release(lock).await;
    }

    Ok(WorkerReport {
        owner_id: coordinator.owner_id().to_string(),
        acquired,
        timed_out,
        stats: coordinator.stats(),
    })
}
