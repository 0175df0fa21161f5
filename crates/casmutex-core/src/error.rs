//! Error types for the mutex coordinator

use casmutex_store::StoreError;

/// Errors surfaced by `MutexCoordinator`.
///
/// Losing an acquisition to another owner is not an error: `acquire` returns
/// `Ok(false)` on timeout.
#[derive(Debug, thiserror::Error)]
pub enum MutexError {
    #[error("lifetime must be -1 (infinite) or a positive number of milliseconds, got {0}")]
    InvalidLifetime(i64),

    #[error("timeout must be -1 (infinite) or a non-negative number of milliseconds, got {0}")]
    InvalidTimeout(i64),

    #[error("invalid coordinator configuration: {0}")]
    InvalidConfig(String),

    #[error("acquisition of '{name}' was cancelled")]
    Cancelled { name: String },

    #[error("store unavailable while acquiring '{name}' ({attempts} consecutive failures): {source}")]
    StoreUnavailable {
        name: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, MutexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MutexError::InvalidLifetime(0);
        assert_eq!(
            err.to_string(),
            "lifetime must be -1 (infinite) or a positive number of milliseconds, got 0"
        );

        let err = MutexError::Cancelled {
            name: "job-42".to_string(),
        };
        assert_eq!(err.to_string(), "acquisition of 'job-42' was cancelled");

        let err = MutexError::StoreUnavailable {
            name: "job-42".to_string(),
            attempts: 5,
            source: StoreError::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "store unavailable while acquiring 'job-42' (5 consecutive failures): store request timed out"
        );
    }

    #[test]
    fn test_store_error_is_source() {
        use std::error::Error;

        let err = MutexError::StoreUnavailable {
            name: "n".to_string(),
            attempts: 1,
            source: StoreError::Unavailable("down".to_string()),
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("store unavailable: down"));
    }
}
