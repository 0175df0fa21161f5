//! Casmutex Core - distributed mutual exclusion over a CAS key-value store
//!
//! This crate provides:
//! - `MutexCoordinator`: acquire/release/ownership protocol against a
//!   `KeyValueStore`
//! - Lock records and the injectable per-coordinator record table
//! - Lifetime and timeout argument types
//! - Coordinator configuration, cancellation and statistics

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod stats;
pub mod table;

pub use cancel::CancelSignal;
pub use config::CoordinatorConfig;
pub use coordinator::MutexCoordinator;
pub use error::{MutexError, Result};
pub use model::{INFINITE_MILLIS, Lifetime, MIN_LIFETIME, LockRecord, LockSnapshot, Timeout};
pub use stats::{LockStats, describe_metrics};
pub use table::LockTable;

pub use casmutex_store::{KeyValueStore, MemoryStore, StoreError, StoreTtl, Versioned};
