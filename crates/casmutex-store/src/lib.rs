//! Casmutex Store - the key-value capability behind the mutex protocol
//!
//! This crate provides:
//! - `KeyValueStore`: read-with-version, add-if-absent, compare-and-swap and
//!   delete-if-version over string keys
//! - `StoreTtl`: the store-side expiry convention (`0` means never)
//! - `StoreError`: transport and store failures
//! - `MemoryStore`: an in-process store with atomic versioned writes

pub mod error;
pub mod memory;
pub mod model;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::{StoreTtl, Versioned};
pub use traits::KeyValueStore;
