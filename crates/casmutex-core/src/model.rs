//! Lock record data model

use std::fmt::Debug;
use std::time::Duration;

use casmutex_store::StoreTtl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{MutexError, Result};

/// Millisecond sentinel meaning "no limit" for both lifetimes and timeouts
pub const INFINITE_MILLIS: i64 = -1;

/// Shortest finite lifetime the store TTL can express
pub const MIN_LIFETIME: Duration = Duration::from_millis(1);

/// How long an acquired lock stays valid for its holder.
///
/// Only constructible through [`Lifetime::from_millis`], [`Lifetime::finite`]
/// or [`Lifetime::INFINITE`], so a finite lifetime is always at least
/// [`MIN_LIFETIME`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    limit: Option<Duration>,
}

impl Lifetime {
    /// Never self-expires; only an explicit release frees it
    pub const INFINITE: Lifetime = Lifetime { limit: None };

    /// Parse a millisecond lifetime: `-1` for infinite, otherwise positive
    pub fn from_millis(ms: i64) -> Result<Self> {
        match ms {
            INFINITE_MILLIS => Ok(Lifetime::INFINITE),
            ms if ms > 0 => Ok(Lifetime {
                limit: Some(Duration::from_millis(ms as u64)),
            }),
            _ => Err(MutexError::InvalidLifetime(ms)),
        }
    }

    /// A finite lifetime; anything under [`MIN_LIFETIME`] is rejected
    pub fn finite(duration: Duration) -> Result<Self> {
        if duration < MIN_LIFETIME {
            return Err(MutexError::InvalidLifetime(duration_millis(duration)));
        }
        Ok(Lifetime {
            limit: Some(duration),
        })
    }

    pub fn is_infinite(&self) -> bool {
        self.limit.is_none()
    }

    /// The expiry window, `None` when infinite
    pub fn duration(&self) -> Option<Duration> {
        self.limit
    }

    /// Millisecond form, `-1` for infinite
    pub fn as_millis(&self) -> i64 {
        match self.limit {
            None => INFINITE_MILLIS,
            Some(d) => duration_millis(d),
        }
    }

    /// Whether a lock acquired at `since` has outlived this lifetime at `now`
    pub fn has_elapsed(&self, since: Instant, now: Instant) -> bool {
        match self.limit {
            None => false,
            Some(d) => now.saturating_duration_since(since) >= d,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.limit {
            Some(d) if d < MIN_LIFETIME => Err(MutexError::InvalidLifetime(duration_millis(d))),
            _ => Ok(()),
        }
    }
}

fn duration_millis(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

impl From<Lifetime> for StoreTtl {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime.limit {
            None => StoreTtl::Never,
            Some(d) => StoreTtl::After(d),
        }
    }
}

/// How long an acquisition keeps retrying before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Retry until acquired or cancelled
    Infinite,
    /// Wall-clock budget measured from the start of the call
    After(Duration),
}

impl Timeout {
    /// Parse a millisecond timeout: `-1` for infinite, otherwise non-negative
    pub fn from_millis(ms: i64) -> Result<Self> {
        match ms {
            INFINITE_MILLIS => Ok(Timeout::Infinite),
            ms if ms >= 0 => Ok(Timeout::After(Duration::from_millis(ms as u64))),
            _ => Err(MutexError::InvalidTimeout(ms)),
        }
    }

    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        match self {
            Timeout::Infinite => None,
            Timeout::After(d) => Some(start + *d),
        }
    }
}

/// Local bookkeeping for one lock name.
///
/// A record is created the first time a name is acquired and is never removed;
/// after release or expiry it simply stops reporting ownership. The version
/// token is kept only while attached so a stale token can never feed a later
/// conditional write.
#[derive(Debug, Clone)]
pub struct LockRecord<V> {
    name: String,
    owner_id: String,
    lifetime: Lifetime,
    acquired_at: Option<Instant>,
    acquired_at_utc: Option<DateTime<Utc>>,
    version: Option<V>,
    attached: bool,
}

impl<V> LockRecord<V> {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>, lifetime: Lifetime) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            lifetime,
            acquired_at: None,
            acquired_at_utc: None,
            version: None,
            attached: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn acquired_at(&self) -> Option<Instant> {
        self.acquired_at
    }

    pub fn acquired_at_utc(&self) -> Option<DateTime<Utc>> {
        self.acquired_at_utc
    }

    /// Version token from the last successful acquisition, while attached
    pub fn version(&self) -> Option<&V> {
        self.version.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Attached and not yet past its lifetime, judged by the local clock
    pub fn is_owned(&self) -> bool {
        self.is_owned_at(Instant::now())
    }

    pub fn is_owned_at(&self, now: Instant) -> bool {
        match self.acquired_at {
            Some(at) if self.attached => !self.lifetime.has_elapsed(at, now),
            _ => false,
        }
    }

    pub(crate) fn set_lifetime(&mut self, lifetime: Lifetime) {
        self.lifetime = lifetime;
    }

    pub(crate) fn attach(&mut self, version: V, now: Instant) {
        self.version = Some(version);
        self.acquired_at = Some(now);
        self.acquired_at_utc = Some(Utc::now());
        self.attached = true;
    }

    pub(crate) fn detach(&mut self) {
        self.version = None;
        self.attached = false;
    }
}

impl<V: Debug> LockRecord<V> {
    pub fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            name: self.name.clone(),
            owner_id: self.owner_id.clone(),
            lifetime_ms: self.lifetime.as_millis(),
            attached: self.attached,
            owned: self.is_owned(),
            acquired_at: self.acquired_at_utc,
            version: self.version.as_ref().map(|v| format!("{:?}", v)),
        }
    }
}

/// Serializable view of a `LockRecord` for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSnapshot {
    pub name: String,
    pub owner_id: String,
    /// `-1` for infinite
    pub lifetime_ms: i64,
    pub attached: bool,
    pub owned: bool,
    #[serde(default)]
    pub acquired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
}
