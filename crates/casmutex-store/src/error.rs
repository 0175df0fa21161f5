//! Store error types

/// Errors raised by a `KeyValueStore` implementation.
///
/// A lost compare-and-swap race is not an error; operations report it as
/// `Ok(false)`. These variants cover the store being unreachable or refusing
/// the request outright.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request timed out")]
    Timeout,

    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
