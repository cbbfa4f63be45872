//! Deadlock detection over live lock entries.
//!
//! The wait-for graph is never stored. It is rebuilt from the owner and waiter
//! snapshots of the entries every time a thread is about to block: an edge
//! `waiter -> owner` exists for every thread queued on an entry someone owns.

use super::entry::LockEntry;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::ThreadId;

/// Whether `requester` blocking on `target` would close a wait-for cycle.
///
/// Waiting is always safe when `target` is free or already held by
/// `requester`. Otherwise it deadlocks exactly when the owner of `target` is,
/// directly or transitively, waiting for a lock `requester` holds.
pub(crate) fn would_deadlock(
    requester: ThreadId,
    target: &LockEntry,
    entries: &[Arc<LockEntry>],
) -> bool {
    let Some(owner) = target.owner() else {
        return false;
    };
    if owner == requester {
        return false;
    }
    threads_waiting_for(requester, entries).contains(&owner)
}

/// Every thread blocked, directly or through a chain of held locks, behind a
/// lock owned by `owner`.
///
/// Each thread is expanded at most once, so inconsistent snapshots cannot make
/// the walk loop.
pub(crate) fn threads_waiting_for(owner: ThreadId, entries: &[Arc<LockEntry>]) -> HashSet<ThreadId> {
    let mut waiting = HashSet::new();
    let mut pending = vec![owner];

    while let Some(holder) = pending.pop() {
        for entry in entries.iter().filter(|entry| entry.is_held_by(holder)) {
            for waiter in entry.queued_threads() {
                if waiting.insert(waiter) {
                    pending.push(waiter);
                }
            }
        }
    }

    waiting
}
