//! Configuration model for idlock.
//!
//! This module defines the `LockConfig` struct, usually read from an
//! `idlock.yaml` file. It supports forward-compatible YAML parsing (unknown
//! fields are ignored), sensible defaults for optional fields, and validation
//! of config values.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::LockConfig;
pub use types::{AcquireOrdering, StressSettings};
