//! Casmutex CLI - configuration, logging and contention drills
//!
//! This crate provides:
//! - Layered configuration (file, environment, flags)
//! - Logging initialisation with optional rolling log files
//! - Ctrl+C/SIGTERM handling wired to acquisition cancellation
//! - `contend` and `scenario` drills against an in-memory store

pub mod command;
pub mod model;
pub mod startup;
