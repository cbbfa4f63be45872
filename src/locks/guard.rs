//! RAII lock guard implementation.

use super::registry::IdentifierLock;
use crate::error::Result;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

/// RAII guard for one hold of an identifier lock.
///
/// When dropped, the hold is released. If the release fails, a warning is
/// logged but no panic occurs. The guard cannot be sent to another thread
/// because only the owning thread may release the lock.
pub struct LockGuard<'a, K>
where
    K: Eq + Hash + Clone + Debug,
{
    registry: &'a IdentifierLock<K>,

    /// Identifier the hold was obtained for.
    identifier: K,

    /// Whether the lock has been released manually.
    released: bool,

    _not_send: PhantomData<*const ()>,
}

impl<'a, K> LockGuard<'a, K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub(super) fn new(registry: &'a IdentifierLock<K>, identifier: K) -> Self {
        Self {
            registry,
            identifier,
            released: false,
            _not_send: PhantomData,
        }
    }

    /// Get the identifier this guard holds a lock for.
    pub fn identifier(&self) -> &K {
        &self.identifier
    }

    /// Manually release the lock.
    ///
    /// This is useful when you want to release the lock before the guard
    /// goes out of scope, and want to handle errors explicitly.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.registry.release_lock(&self.identifier)
    }
}

impl<K> Drop for LockGuard<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.registry.release_lock(&self.identifier)
        {
            tracing::warn!(identifier = ?self.identifier, error = %e, "failed to release lock");
        }
    }
}

impl<K> Debug for LockGuard<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("identifier", &self.identifier)
            .field("released", &self.released)
            .finish()
    }
}
