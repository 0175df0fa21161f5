//! Store data model

use std::time::Duration;

/// Result of a versioned read.
///
/// `version` is opaque and only meaningful to the store that produced it.
/// A missing value with a version present means the store kept a tombstone
/// for the key; a conditional write against that version is still possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<V> {
    pub value: Option<String>,
    pub version: Option<V>,
}

impl<V> Versioned<V> {
    /// Nothing stored and no prior write observed
    pub fn absent() -> Self {
        Self {
            value: None,
            version: None,
        }
    }

    /// A live value at the given version
    pub fn present(value: impl Into<String>, version: V) -> Self {
        Self {
            value: Some(value.into()),
            version: Some(version),
        }
    }

    /// No live value, but the store still tracks a version for the key
    pub fn tombstone(version: V) -> Self {
        Self {
            value: None,
            version: Some(version),
        }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the stored value equals `expected`
    pub fn holds(&self, expected: &str) -> bool {
        self.value.as_deref() == Some(expected)
    }
}

/// Expiry attached to a store write.
///
/// Stores conventionally encode "never expires" as a zero TTL; `as_millis`
/// produces that wire form. Application lifetimes convert into this type at
/// the store boundary and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreTtl {
    #[default]
    Never,
    After(Duration),
}

impl StoreTtl {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            StoreTtl::Never
        } else {
            StoreTtl::After(Duration::from_millis(ms))
        }
    }

    /// Wire representation: `0` for never, otherwise whole milliseconds
    /// (rounded up so a sub-millisecond TTL never turns into "never").
    pub fn as_millis(&self) -> u64 {
        match self {
            StoreTtl::Never => 0,
            StoreTtl::After(d) => {
                let ms = d.as_millis();
                if ms == 0 { 1 } else { ms.min(u64::MAX as u128) as u64 }
            }
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            StoreTtl::Never => None,
            StoreTtl::After(d) => Some(*d),
        }
    }
}
