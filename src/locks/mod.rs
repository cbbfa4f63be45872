//! Per-identifier reentrant locking.
//!
//! This module implements the lock model used to serialize access to
//! independently identified resources (aggregates, sagas) without a global
//! lock:
//! - One reentrant lock entry per identifier, created on first use
//! - Entries dispose of themselves once their last hold is released
//! - Deadlock detection before a thread blocks on another thread's lock
//!
//! # Lock Entries
//!
//! Entries live in an [`IdentifierLock`] registry. Creating an entry and
//! removing a disposed one are atomic map operations, and removal only
//! happens if the mapping still points at the disposed instance, so a fresh
//! entry created in between is never evicted.
//!
//! # Deadlock Detection
//!
//! The wait-for graph is rebuilt from the entries' owners and waiters every
//! time a thread is about to wait, and again after every poll interval while
//! it keeps waiting. A thread whose wait would close a cycle gets
//! [`LockError::Deadlock`](crate::error::LockError::Deadlock).
//!
//! # RAII Guards
//!
//! [`IdentifierLock::lock`] returns a guard that releases its hold when
//! dropped. If the release fails during drop, a warning is logged but the
//! program does not crash.

mod deadlock;
mod entry;
mod guard;
mod interrupt;
mod registry;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use guard::LockGuard;
pub use interrupt::InterruptHandle;
pub use registry::IdentifierLock;
pub use types::LockInfo;
