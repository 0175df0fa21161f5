//! Coordinator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MutexError, Result};

/// Key prefix shared by every process in the default lock namespace
pub const DEFAULT_KEY_PREFIX: &str = "casmutex-";

/// Pause between acquisition attempts
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 50;

/// Consecutive store failures tolerated before an acquisition aborts
pub const DEFAULT_MAX_STORE_FAILURES: u32 = 5;

/// Settings for one `MutexCoordinator`.
///
/// `owner_id` identifies this coordinator in the store and must be unique
/// across every process sharing `key_prefix`; two processes with the same id
/// will both believe they hold the same lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Value written into the store to mark ownership
    pub owner_id: String,
    /// Prepended to every lock name to form the store key
    pub key_prefix: String,
    /// Delay between failed acquisition attempts, in milliseconds
    pub retry_interval_ms: u64,
    /// Consecutive store errors before giving up (0 = retry forever)
    pub max_store_failures: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            owner_id: generate_owner_id(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_store_failures: DEFAULT_MAX_STORE_FAILURES,
        }
    }
}

impl CoordinatorConfig {
    /// Create a config with an explicit owner id; an empty id gets a fresh UUID
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Default::default()
        }
        .normalized()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = interval.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_max_store_failures(mut self, max: u32) -> Self {
        self.max_store_failures = max;
        self
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Fill in an owner id when none was configured
    pub fn normalized(mut self) -> Self {
        if self.owner_id.trim().is_empty() {
            self.owner_id = generate_owner_id();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(MutexError::InvalidConfig(
                "owner_id must not be empty".to_string(),
            ));
        }
        if self.retry_interval_ms == 0 {
            return Err(MutexError::InvalidConfig(
                "retry_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn generate_owner_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
