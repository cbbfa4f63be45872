//! Lock information structures.

use std::fmt::Debug;
use std::thread::ThreadId;

/// Point-in-time information about a live lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo<K> {
    /// The identifier the lock protects.
    pub identifier: K,

    /// Thread currently holding the lock, if any.
    pub owner: Option<ThreadId>,

    /// Number of nested holds by the owner.
    pub hold_count: usize,

    /// Number of threads blocked acquiring the lock.
    pub waiters: usize,
}

impl<K: Debug> std::fmt::Display for LockInfo<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.owner {
            Some(owner) => write!(
                f,
                "{:?} (owner: {:?}, holds: {}, waiters: {})",
                self.identifier, owner, self.hold_count, self.waiters
            ),
            None => write!(f, "{:?} (free, waiters: {})", self.identifier, self.waiters),
        }
    }
}
