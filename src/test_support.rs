use crate::config::LockConfig;
use crate::locks::IdentifierLock;
use std::sync::mpsc;
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Ids of `N` distinct threads that have already finished.
///
/// Thread ids are never reused, so these are safe to use as stand-ins when
/// building wait-for graphs by hand.
pub(crate) fn spawn_thread_ids<const N: usize>() -> [ThreadId; N] {
    std::array::from_fn(|_| thread::spawn(|| thread::current().id()).join().unwrap())
}

/// A registry that re-runs its deadlock check every 10ms.
pub(crate) fn fast_registry() -> IdentifierLock {
    let config = LockConfig {
        poll_interval_ms: 10,
        ..LockConfig::default()
    };
    IdentifierLock::with_config(&config)
}

/// Run `f` on its own thread and panic if it does not finish within `limit`.
///
/// Used to turn a would-be hang into a test failure.
pub(crate) fn within<T, F>(limit: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let _ = tx.send(f());
    });

    match rx.recv_timeout(limit) {
        Ok(value) => {
            handle.join().unwrap();
            value
        }
        Err(mpsc::RecvTimeoutError::Timeout) => panic!("did not complete within {:?}", limit),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // The closure panicked; surface its panic.
            match handle.join() {
                Err(panic) => std::panic::resume_unwind(panic),
                Ok(()) => unreachable!("sender dropped without sending"),
            }
        }
    }
}

/// Spin until `condition` holds, panicking after five seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            std::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        thread::sleep(Duration::from_millis(1));
    }
}
