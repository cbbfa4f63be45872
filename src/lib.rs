//! idlock: per-identifier reentrant locks with deadlock detection.
//!
//! Serializes concurrent access to independently identified resources, such
//! as aggregates in an event-sourced store, without a single global lock.
//! Distinct identifiers never block each other; the same identifier
//! serializes and is reentrant for its owning thread. A thread that would
//! close a wait-for cycle is refused with [`LockError::Deadlock`] instead of
//! hanging.
//!
//! ```
//! use idlock::{IdentifierLock, LockConfig};
//!
//! let config = LockConfig::from_yaml("poll_interval_ms: 20")?;
//! let locks: IdentifierLock = IdentifierLock::with_config(&config);
//!
//! let guard = locks.lock("saga-42")?;
//! assert!(locks.has_lock("saga-42"));
//! drop(guard);
//! assert!(locks.is_empty());
//! # Ok::<(), idlock::LockError>(())
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod locks;

#[cfg(test)]
mod test_support;

pub use config::LockConfig;
pub use error::{LockError, Result};
pub use locks::{IdentifierLock, InterruptHandle, LockGuard, LockInfo};
