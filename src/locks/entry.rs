//! Reentrant, disposable lock entries.
//!
//! A `LockEntry` is bound to exactly one identifier for its whole life. Once
//! its last hold is released without any thread waiting for it, the entry
//! closes itself and can never be locked again; the registry then drops it so
//! the next caller for that identifier gets a fresh entry.

use crate::error::{LockError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

/// What a blocking acquisition needs from the registry that owns the entry.
pub(crate) trait WaitPolicy {
    /// Run the deadlock check for `me` against `entry` and, if waiting is
    /// safe, register `me` as a waiter of `entry`. Checks and registrations
    /// of different threads must not interleave.
    fn admit_waiter(&self, me: ThreadId, entry: &LockEntry) -> Result<()>;

    /// Mark `me` as parked on `entry` so an interrupt can wake it.
    fn park(&self, me: ThreadId, entry: &Arc<LockEntry>);

    fn unpark(&self, me: ThreadId);

    /// Consume a pending interrupt for `me`.
    fn take_interrupt(&self, me: ThreadId) -> bool;

    /// Upper bound of a single wait before the deadlock check runs again.
    fn poll_interval(&self) -> Duration;
}

/// Outcome of [`LockEntry::lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquired {
    /// The calling thread now holds the entry.
    Held,
    /// The entry was closed before the calling thread got it; nothing is held.
    Closed,
}

#[derive(Debug, Default)]
struct EntryState {
    owner: Option<ThreadId>,
    hold_count: usize,
    waiters: Vec<ThreadId>,
    closed: bool,
}

impl EntryState {
    fn try_enter(&mut self, me: ThreadId) -> bool {
        match self.owner {
            Some(owner) if owner == me => {
                self.hold_count += 1;
                true
            }
            Some(_) => false,
            None => {
                self.owner = Some(me);
                self.hold_count = 1;
                true
            }
        }
    }

    fn remove_waiter(&mut self, me: ThreadId) {
        self.waiters.retain(|&waiter| waiter != me);
    }
}

#[derive(Debug, Default)]
pub(crate) struct LockEntry {
    state: Mutex<EntryState>,
    released: Condvar,
}

impl LockEntry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take the entry without blocking, or bump the hold count if the calling
    /// thread already owns it.
    pub(crate) fn try_enter(&self) -> bool {
        self.state.lock().try_enter(thread::current().id())
    }

    /// Acquire the entry for the calling thread, blocking while another thread
    /// holds it.
    ///
    /// Reentrant acquisitions and acquisitions of a free entry never consult
    /// the deadlock check. Otherwise the check runs before every bounded wait.
    /// A failed wait leaves no hold and no waiter registration behind, and
    /// closes the entry if it is left unused.
    pub(crate) fn lock(self: &Arc<Self>, policy: &impl WaitPolicy) -> Result<Acquired> {
        let me = thread::current().id();

        if !self.try_enter() {
            let waited = self.wait_until_entered(me, policy);
            policy.unpark(me);
            if let Err(err) = waited {
                let mut state = self.state.lock();
                state.remove_waiter(me);
                // The owner may have released while we were queued; nobody
                // else will close the entry then.
                if state.owner.is_none() && state.waiters.is_empty() {
                    state.closed = true;
                }
                return Err(err);
            }
        }

        let mut state = self.state.lock();
        if state.closed {
            // Closed entries are never handed out again; undo our hold.
            state.hold_count -= 1;
            if state.hold_count == 0 {
                state.owner = None;
                self.released.notify_all();
            }
            return Ok(Acquired::Closed);
        }
        Ok(Acquired::Held)
    }

    fn wait_until_entered(self: &Arc<Self>, me: ThreadId, policy: &impl WaitPolicy) -> Result<()> {
        loop {
            policy.admit_waiter(me, self)?;
            policy.park(me, self);

            let mut state = self.state.lock();
            if policy.take_interrupt(me) {
                return Err(LockError::AcquisitionFailed(
                    "thread was interrupted while waiting for a lock".to_string(),
                ));
            }
            if !state.try_enter(me) {
                self.released.wait_for(&mut state, policy.poll_interval());
                if !state.try_enter(me) {
                    continue;
                }
            }
            state.remove_waiter(me);
            return Ok(());
        }
    }

    /// Release one hold of the calling thread.
    ///
    /// Returns `true` when this was the final hold and nobody was waiting, in
    /// which case the entry is now closed and must be removed from the
    /// registry. If a contender is waiting the entry stays open for it.
    pub(crate) fn unlock(&self) -> Result<bool> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        match state.owner {
            Some(owner) if owner == me => {}
            Some(_) => {
                return Err(LockError::NotOwner(
                    "lock is held by another thread".to_string(),
                ));
            }
            None => {
                return Err(LockError::NotOwner("lock is not held".to_string()));
            }
        }

        state.hold_count -= 1;
        if state.hold_count > 0 {
            return Ok(false);
        }

        state.owner = None;
        let dispose = state.waiters.is_empty();
        if dispose {
            state.closed = true;
        }
        self.released.notify_all();
        Ok(dispose)
    }

    pub(crate) fn register_waiter(&self, me: ThreadId) {
        let mut state = self.state.lock();
        if !state.waiters.contains(&me) {
            state.waiters.push(me);
        }
    }

    /// Wake every thread waiting on this entry so it re-checks its state.
    pub(crate) fn wake_all(&self) {
        let _state = self.state.lock();
        self.released.notify_all();
    }

    /// Snapshot of the threads currently blocked acquiring this entry.
    pub(crate) fn queued_threads(&self) -> Vec<ThreadId> {
        self.state.lock().waiters.clone()
    }

    pub(crate) fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    pub(crate) fn hold_count(&self) -> usize {
        self.state.lock().hold_count
    }

    pub(crate) fn is_held_by(&self, thread: ThreadId) -> bool {
        self.owner() == Some(thread)
    }

    pub(crate) fn is_held_by_current_thread(&self) -> bool {
        self.is_held_by(thread::current().id())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Hand the entry to an arbitrary thread id, for building wait-for graphs
    /// in tests without real threads.
    #[cfg(test)]
    pub(crate) fn force_owner(&self, owner: ThreadId) {
        let mut state = self.state.lock();
        state.owner = Some(owner);
        state.hold_count = 1;
    }
}
