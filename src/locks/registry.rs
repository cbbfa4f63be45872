//! The identifier to lock-entry registry.

use super::deadlock;
use super::entry::{Acquired, LockEntry, WaitPolicy};
use super::guard::LockGuard;
use super::interrupt::{InterruptHandle, Interrupts};
use super::types::LockInfo;
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{debug, trace};

/// Reentrant locks keyed by identifier, with deadlock detection.
///
/// Any number of distinct identifiers can be locked at the same time by
/// different threads. Locks on the same identifier serialize and are
/// reentrant for the owning thread. Entries are created on first use and
/// dropped as soon as their last hold is released, so an idle registry is
/// empty.
///
/// Before a thread blocks on an identifier held by another thread, the
/// registry walks the wait-for relation implied by current ownership. If the
/// owner is already waiting, directly or transitively, for a lock held by the
/// requesting thread, the acquisition fails with [`LockError::Deadlock`]
/// instead of hanging.
///
/// ```
/// use idlock::IdentifierLock;
///
/// let locks: IdentifierLock = IdentifierLock::new();
/// locks.obtain_lock("order-17")?;
/// assert!(locks.has_lock("order-17"));
/// locks.release_lock("order-17")?;
/// assert!(locks.is_empty());
/// # Ok::<(), idlock::LockError>(())
/// ```
pub struct IdentifierLock<K = String> {
    locks: Mutex<HashMap<K, Arc<LockEntry>>>,
    /// Serializes deadlock checks with waiter registration.
    deadlock_check: Mutex<()>,
    interrupts: Arc<Interrupts>,
    poll_interval: Duration,
}

impl<K> IdentifierLock<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&LockConfig::default())
    }

    /// Create an empty registry using the settings in `config`.
    pub fn with_config(config: &LockConfig) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            deadlock_check: Mutex::new(()),
            interrupts: Arc::new(Interrupts::default()),
            poll_interval: config.poll_interval(),
        }
    }

    /// Whether the calling thread holds the lock for `identifier`.
    ///
    /// The answer can be stale as soon as it is returned unless the calling
    /// thread holds the lock.
    pub fn has_lock<Q>(&self, identifier: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.locks
            .lock()
            .get(identifier)
            .is_some_and(|entry| entry.is_held_by_current_thread())
    }

    /// Obtain the lock for `identifier`, blocking until it is available.
    ///
    /// # Errors
    ///
    /// * `LockError::Deadlock` - waiting would close a wait-for cycle; locks
    ///   already held by the calling thread stay held
    /// * `LockError::AcquisitionFailed` - the wait was interrupted
    pub fn obtain_lock<Q>(&self, identifier: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        loop {
            let entry = self.entry_for(identifier);
            let acquired = entry.lock(self);
            if !matches!(acquired, Ok(Acquired::Held)) && entry.is_closed() {
                self.remove_if_same(identifier, &entry);
            }
            match acquired {
                Ok(Acquired::Held) => {
                    trace!(identifier = ?identifier, "lock obtained");
                    return Ok(());
                }
                Ok(Acquired::Closed) => {
                    trace!(identifier = ?identifier, "lock entry closed underneath us, retrying");
                }
                Err(LockError::Deadlock(_)) => {
                    debug!(identifier = ?identifier, "refusing lock acquisition that would deadlock");
                    return Err(LockError::Deadlock(format!(
                        "an imminent deadlock was detected while attempting to acquire the lock for {:?}",
                        identifier
                    )));
                }
                Err(LockError::AcquisitionFailed(reason)) => {
                    debug!(identifier = ?identifier, "lock acquisition interrupted");
                    return Err(LockError::AcquisitionFailed(format!(
                        "{} (lock for {:?})",
                        reason, identifier
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Release one hold of the lock for `identifier`.
    ///
    /// When the final hold is released and no other thread is waiting, the
    /// entry is disposed of and removed from the registry.
    ///
    /// # Errors
    ///
    /// * `LockError::IllegalRelease` - no lock for `identifier` was ever obtained
    /// * `LockError::NotOwner` - the calling thread does not hold the lock
    pub fn release_lock<Q>(&self, identifier: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let entry = self.locks.lock().get(identifier).cloned().ok_or_else(|| {
            LockError::IllegalRelease(format!(
                "no lock for {:?} was ever obtained",
                identifier
            ))
        })?;

        let disposed = entry.unlock().map_err(|err| match err {
            LockError::NotOwner(reason) => LockError::NotOwner(format!(
                "could not release the lock for {:?}: {}",
                identifier, reason
            )),
            other => other,
        })?;

        if disposed {
            self.remove_if_same(identifier, &entry);
            trace!(identifier = ?identifier, "lock entry disposed");
        }
        Ok(())
    }

    /// Obtain the lock for `identifier` and return a guard that releases it
    /// when dropped.
    pub fn lock<Q>(&self, identifier: &Q) -> Result<LockGuard<'_, K>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        self.obtain_lock(identifier)?;
        Ok(LockGuard::new(self, identifier.to_owned()))
    }

    /// A handle that lets another thread interrupt the calling thread's
    /// blocked acquisitions on this registry.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle::new(thread::current().id(), Arc::clone(&self.interrupts))
    }

    /// Snapshot of every live lock, sorted by identifier.
    pub fn list_locks(&self) -> Vec<LockInfo<K>> {
        let entries: Vec<(K, Arc<LockEntry>)> = self
            .locks
            .lock()
            .iter()
            .map(|(identifier, entry)| (identifier.clone(), Arc::clone(entry)))
            .collect();

        let mut locks: Vec<LockInfo<K>> = entries
            .into_iter()
            .map(|(identifier, entry)| LockInfo {
                identifier,
                owner: entry.owner(),
                hold_count: entry.hold_count(),
                waiters: entry.queued_threads().len(),
            })
            .collect();

        // Sort for consistent output
        locks.sort_by_cached_key(|info| format!("{:?}", info.identifier));
        locks
    }

    /// Number of identifiers currently mapped to a lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Fetch the live entry for `identifier`, creating it if absent.
    fn entry_for<Q>(&self, identifier: &Q) -> Arc<LockEntry>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        let mut locks = self.locks.lock();
        if let Some(entry) = locks.get(identifier) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(LockEntry::new());
        locks.insert(identifier.to_owned(), Arc::clone(&entry));
        trace!(identifier = ?identifier, "lock entry created");
        entry
    }

    /// Remove the mapping for `identifier` only if it still points at `entry`.
    fn remove_if_same<Q>(&self, identifier: &Q, entry: &Arc<LockEntry>)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut locks = self.locks.lock();
        if locks
            .get(identifier)
            .is_some_and(|mapped| Arc::ptr_eq(mapped, entry))
        {
            locks.remove(identifier);
        }
    }

    fn entries(&self) -> Vec<Arc<LockEntry>> {
        self.locks.lock().values().cloned().collect()
    }
}

impl<K> WaitPolicy for IdentifierLock<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn admit_waiter(&self, me: ThreadId, entry: &LockEntry) -> Result<()> {
        let _check = self.deadlock_check.lock();
        if deadlock::would_deadlock(me, entry, &self.entries()) {
            return Err(LockError::Deadlock(
                "waiting would close a wait-for cycle".to_string(),
            ));
        }
        entry.register_waiter(me);
        Ok(())
    }

    fn park(&self, me: ThreadId, entry: &Arc<LockEntry>) {
        self.interrupts.park(me, entry);
    }

    fn unpark(&self, me: ThreadId) {
        self.interrupts.unpark(me);
    }

    fn take_interrupt(&self, me: ThreadId) -> bool {
        self.interrupts.take(me)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl<K> Default for IdentifierLock<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Debug for IdentifierLock<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierLock")
            .field("locks", &self.list_locks())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
