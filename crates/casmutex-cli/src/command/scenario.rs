//! `scenario`: two instances trading one lock
//!
//! 1. A acquires with a zero timeout and gets the lock.
//! 2. B tries with `timeout_ms` and times out.
//! 3. A owns the lock; B does not.
//! 4. A releases; B acquires.
//! 5. A's zero-timeout attempt fails while B holds it, then B releases.

use casmutex_core::{CancelSignal, CoordinatorConfig, Lifetime, MemoryStore, MutexCoordinator, Timeout};
use serde::Serialize;
use tracing::info;

use crate::model::ScenarioArgs;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    pub instance: String,
    pub action: String,
    pub expected: bool,
    pub actual: bool,
}

impl ScenarioStep {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub lock: String,
    pub passed: bool,
    pub steps: Vec<ScenarioStep>,
}

struct Recorder {
    steps: Vec<ScenarioStep>,
}

impl Recorder {
    fn record(&mut self, instance: &str, action: &str, expected: bool, actual: bool) {
        info!(instance, action, expected, actual, "Scenario step");
        self.steps.push(ScenarioStep {
            instance: instance.to_string(),
            action: action.to_string(),
            expected,
            actual,
        });
    }
}

pub async fn run_scenario(
    base: &CoordinatorConfig,
    args: &ScenarioArgs,
    cancel: &CancelSignal,
) -> anyhow::Result<ScenarioReport> {
    let lifetime = Lifetime::from_millis(args.lifetime_ms)?;
    let timeout = Timeout::from_millis(args.timeout_ms)?;
    let now = Timeout::After(std::time::Duration::ZERO);
    let lock = args.lock.as_str();

    let store = MemoryStore::new();
    let instance = |suffix: &str| {
        MutexCoordinator::new(
            store.clone(),
            CoordinatorConfig {
                owner_id: format!("{}-{}", base.owner_id, suffix),
                ..base.clone()
            },
        )
    };
    let a = instance("a")?;
    let b = instance("b")?;

    let mut recorder = Recorder { steps: Vec::new() };

    let acquired = a.acquire_with_cancel(lock, now, lifetime, cancel).await?;
    recorder.record("A", "acquire (timeout 0)", true, acquired);

    let acquired = b.acquire_with_cancel(lock, timeout, lifetime, cancel).await?;
    recorder.record("B", "acquire while A holds", false, acquired);

    recorder.record("A", "owns", true, a.owns(lock));
    recorder.record("B", "owns", false, b.owns(lock));

    a.release(lock).await;
    recorder.record("A", "owns after release", false, a.owns(lock));

    let acquired = b.acquire_with_cancel(lock, timeout, lifetime, cancel).await?;
    recorder.record("B", "acquire after A released", true, acquired);

    let acquired = a.acquire_with_cancel(lock, now, lifetime, cancel).await?;
    recorder.record("A", "acquire while B holds", false, acquired);

    b.release(lock).await;
    recorder.record("B", "owns after release", false, b.owns(lock));

    let passed = recorder.steps.iter().all(ScenarioStep::passed);
    Ok(ScenarioReport {
        lock: args.lock.clone(),
        passed,
        steps: recorder.steps,
    })
}
