//! Interruption of blocked acquisitions.
//!
//! Rust threads cannot be interrupted from the outside, so each registry keeps
//! its own interrupt flags. A flag is consumed by the next blocking wait of
//! that thread; acquisitions that never block leave it pending.

use super::entry::LockEntry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;

#[derive(Default)]
struct ThreadSlot {
    pending: bool,
    parked_on: Option<Arc<LockEntry>>,
}

impl ThreadSlot {
    fn is_idle(&self) -> bool {
        !self.pending && self.parked_on.is_none()
    }
}

#[derive(Default)]
pub(crate) struct Interrupts {
    slots: Mutex<HashMap<ThreadId, ThreadSlot>>,
}

impl Interrupts {
    pub(crate) fn interrupt(&self, thread: ThreadId) {
        let parked_on = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(thread).or_default();
            slot.pending = true;
            slot.parked_on.clone()
        };
        if let Some(entry) = parked_on {
            entry.wake_all();
        }
    }

    pub(crate) fn park(&self, thread: ThreadId, entry: &Arc<LockEntry>) {
        self.slots.lock().entry(thread).or_default().parked_on = Some(Arc::clone(entry));
    }

    pub(crate) fn unpark(&self, thread: ThreadId) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&thread) {
            slot.parked_on = None;
            if slot.is_idle() {
                slots.remove(&thread);
            }
        }
    }

    pub(crate) fn take(&self, thread: ThreadId) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&thread) else {
            return false;
        };
        let pending = std::mem::take(&mut slot.pending);
        if slot.is_idle() {
            slots.remove(&thread);
        }
        pending
    }

    pub(crate) fn is_pending(&self, thread: ThreadId) -> bool {
        self.slots.lock().get(&thread).is_some_and(|slot| slot.pending)
    }
}

/// Handle for interrupting one thread's pending lock acquisition.
///
/// Obtain it with [`IdentifierLock::interrupt_handle`](super::IdentifierLock::interrupt_handle)
/// on the thread that is going to block, then hand it to whichever thread
/// should be able to cancel the wait. An interrupted `obtain_lock` fails with
/// [`LockError::AcquisitionFailed`](crate::error::LockError::AcquisitionFailed).
#[derive(Clone)]
pub struct InterruptHandle {
    thread: ThreadId,
    interrupts: Arc<Interrupts>,
}

impl InterruptHandle {
    pub(crate) fn new(thread: ThreadId, interrupts: Arc<Interrupts>) -> Self {
        Self { thread, interrupts }
    }

    /// The thread this handle interrupts.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Interrupt the thread, waking it if it is blocked on a lock.
    pub fn interrupt(&self) {
        self.interrupts.interrupt(self.thread);
    }

    /// Whether an interrupt has been raised and not yet consumed.
    pub fn is_pending(&self) -> bool {
        self.interrupts.is_pending(self.thread)
    }
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("thread", &self.thread)
            .field("pending", &self.is_pending())
            .finish()
    }
}
