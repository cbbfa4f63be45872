//! Tests for the locks subsystem.

use super::*;
use crate::config::LockConfig;
use crate::error::LockError;
use crate::test_support::{fast_registry, wait_until, within};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

const IDENTIFIER: &str = "mockId";

#[test]
fn test_lock_reference_cleaned_up_at_unlock() {
    let locks: IdentifierLock = IdentifierLock::new();

    locks.obtain_lock(IDENTIFIER).unwrap();
    assert_eq!(locks.len(), 1);

    locks.release_lock(IDENTIFIER).unwrap();
    assert!(locks.is_empty(), "expected lock to be cleaned up");
}

#[test]
fn test_lock_only_cleaned_up_if_no_locks_are_held() {
    let locks: IdentifierLock = IdentifierLock::new();

    assert!(!locks.has_lock(IDENTIFIER));

    locks.obtain_lock(IDENTIFIER).unwrap();
    assert!(locks.has_lock(IDENTIFIER));

    locks.obtain_lock(IDENTIFIER).unwrap();
    assert!(locks.has_lock(IDENTIFIER));

    locks.release_lock(IDENTIFIER).unwrap();
    assert!(locks.has_lock(IDENTIFIER));
    assert_eq!(locks.len(), 1);

    locks.release_lock(IDENTIFIER).unwrap();
    assert!(!locks.has_lock(IDENTIFIER));
    assert!(locks.is_empty());
}

#[test]
fn test_reentrant_depth_is_tracked() {
    let locks: IdentifierLock = IdentifierLock::new();
    let depth = 5;

    for _ in 0..depth {
        locks.obtain_lock(IDENTIFIER).unwrap();
        assert!(locks.has_lock(IDENTIFIER));
    }
    assert_eq!(locks.list_locks()[0].hold_count, depth);

    for remaining in (0..depth).rev() {
        locks.release_lock(IDENTIFIER).unwrap();
        assert_eq!(locks.has_lock(IDENTIFIER), remaining > 0);
    }
}

#[test]
fn test_registry_empty_after_releasing_everything() {
    let locks: IdentifierLock = IdentifierLock::new();
    let identifiers = ["a", "b", "c", "a", "d", "b"];

    for id in identifiers {
        locks.obtain_lock(id).unwrap();
    }
    assert_eq!(locks.len(), 4);

    for id in identifiers.iter().rev() {
        locks.release_lock(*id).unwrap();
    }
    assert!(locks.is_empty());
}

#[test]
fn test_has_lock_is_false_for_other_threads() {
    let locks: IdentifierLock = IdentifierLock::new();
    locks.obtain_lock(IDENTIFIER).unwrap();

    thread::scope(|s| {
        s.spawn(|| assert!(!locks.has_lock(IDENTIFIER)));
    });

    locks.release_lock(IDENTIFIER).unwrap();
}

#[test]
fn test_release_of_never_obtained_lock_fails() {
    let locks: IdentifierLock = IdentifierLock::new();

    let err = locks.release_lock(IDENTIFIER).unwrap_err();
    assert!(matches!(err, LockError::IllegalRelease(_)));
    assert!(err.to_string().contains("mockId"));
}

#[test]
fn test_release_after_full_release_fails() {
    let locks: IdentifierLock = IdentifierLock::new();
    locks.obtain_lock(IDENTIFIER).unwrap();
    locks.release_lock(IDENTIFIER).unwrap();

    // The entry was disposed of, so this looks like a lock never obtained.
    let err = locks.release_lock(IDENTIFIER).unwrap_err();
    assert!(matches!(err, LockError::IllegalRelease(_)));
}

#[test]
fn test_release_by_non_owner_fails() {
    let locks: IdentifierLock = IdentifierLock::new();
    locks.obtain_lock(IDENTIFIER).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            let err = locks.release_lock(IDENTIFIER).unwrap_err();
            assert!(matches!(err, LockError::NotOwner(_)));
        });
    });

    // Still held by us after the failed foreign release.
    assert!(locks.has_lock(IDENTIFIER));
    locks.release_lock(IDENTIFIER).unwrap();
    assert!(locks.is_empty());
}

#[test]
#[serial]
fn test_distinct_identifiers_do_not_block_each_other() {
    let locks = Arc::new(fast_registry());

    within(Duration::from_secs(5), move || {
        let both_held = Barrier::new(2);
        thread::scope(|s| {
            for id in ["id1", "id2"] {
                let locks = &locks;
                let both_held = &both_held;
                s.spawn(move || {
                    locks.obtain_lock(id).unwrap();
                    // Only passes if the other thread got its lock too.
                    both_held.wait();
                    locks.release_lock(id).unwrap();
                });
            }
        });
        assert!(locks.is_empty());
    });
}

#[test]
#[serial]
fn test_same_identifier_is_mutually_exclusive() {
    let locks = fast_registry();
    let released = AtomicBool::new(false);

    locks.obtain_lock(IDENTIFIER).unwrap();

    thread::scope(|s| {
        let contender = s.spawn(|| {
            locks.obtain_lock(IDENTIFIER).unwrap();
            let saw_release = released.load(Ordering::SeqCst);
            locks.release_lock(IDENTIFIER).unwrap();
            saw_release
        });

        wait_until(|| locks.list_locks().first().is_some_and(|info| info.waiters == 1));
        // Give the contender a few poll intervals to misbehave.
        thread::sleep(Duration::from_millis(50));

        released.store(true, Ordering::SeqCst);
        locks.release_lock(IDENTIFIER).unwrap();

        assert!(contender.join().unwrap(), "contender entered while lock was held");
    });

    assert!(locks.is_empty());
}

#[test]
#[serial]
fn test_concurrent_use_never_loses_exclusion_or_entries() {
    let locks: IdentifierLock = fast_registry();
    let inside: Vec<AtomicUsize> = (0..3).map(|_| AtomicUsize::new(0)).collect();
    let ids = ["x", "y", "z"];

    thread::scope(|s| {
        for worker in 0..8 {
            let locks = &locks;
            let inside = &inside;
            s.spawn(move || {
                for round in 0..200 {
                    let slot = (worker + round) % ids.len();
                    locks.obtain_lock(ids[slot]).unwrap();
                    assert_eq!(inside[slot].fetch_add(1, Ordering::SeqCst), 0);
                    // Nested reentrant hold on the same identifier.
                    locks.obtain_lock(ids[slot]).unwrap();
                    locks.release_lock(ids[slot]).unwrap();
                    assert_eq!(inside[slot].fetch_sub(1, Ordering::SeqCst), 1);
                    locks.release_lock(ids[slot]).unwrap();
                }
            });
        }
    });

    assert!(locks.is_empty());
}

/// Take `first`, wait for everyone, then try `second`.
///
/// Returns whether `second` was refused as a deadlock.
fn lock_pair(
    locks: &IdentifierLock,
    holding: &Barrier,
    first: &str,
    second: &str,
) -> bool {
    locks.obtain_lock(first).unwrap();
    holding.wait();

    let deadlocked = match locks.obtain_lock(second) {
        Ok(()) => {
            locks.release_lock(second).unwrap();
            false
        }
        Err(LockError::Deadlock(_)) => true,
        Err(other) => panic!("unexpected error: {}", other),
    };

    locks.release_lock(first).unwrap();
    deadlocked
}

#[test]
#[serial]
fn test_deadlock_detected_two_threads_in_vector() {
    let locks = Arc::new(fast_registry());

    let refusals = within(Duration::from_secs(5), {
        let locks = Arc::clone(&locks);
        move || {
            let holding = Barrier::new(2);
            thread::scope(|s| {
                let t1 = s.spawn(|| lock_pair(&locks, &holding, "id1", "id2"));
                let main = lock_pair(&locks, &holding, "id2", "id1");
                [main, t1.join().unwrap()]
            })
        }
    });

    assert_eq!(
        refusals.iter().filter(|&&refused| refused).count(),
        1,
        "exactly one participant should be refused: {:?}",
        refusals
    );
    assert!(locks.is_empty());
}

#[test]
#[serial]
fn test_deadlock_detected_three_threads_in_vector() {
    let locks = Arc::new(fast_registry());

    let refusals = within(Duration::from_secs(5), {
        let locks = Arc::clone(&locks);
        move || {
            let holding = Barrier::new(4);
            thread::scope(|s| {
                let locks: &IdentifierLock = &locks;
                let holding = &holding;
                let chain = [("id1", "id2"), ("id2", "id3"), ("id3", "id4")]
                    .map(|(first, second)| {
                        s.spawn(move || lock_pair(locks, holding, first, second))
                    });
                let mut refusals = vec![lock_pair(locks, holding, "id4", "id1")];
                refusals.extend(chain.map(|t| t.join().unwrap()));
                refusals
            })
        }
    });

    assert!(
        refusals.iter().any(|&refused| refused),
        "the cycle must be broken by a refusal: {:?}",
        refusals
    );
    assert!(locks.is_empty());
}

#[test]
#[serial]
fn test_refused_thread_keeps_its_locks() {
    let locks = fast_registry();
    let holding = Barrier::new(2);

    thread::scope(|s| {
        let other = s.spawn(|| {
            locks.obtain_lock("id1").unwrap();
            holding.wait();
            // Blocks until the main thread gives up "id2".
            locks.obtain_lock("id2").unwrap();
            locks.release_lock("id2").unwrap();
            locks.release_lock("id1").unwrap();
        });

        locks.obtain_lock("id2").unwrap();
        holding.wait();
        wait_until(|| {
            locks
                .list_locks()
                .iter()
                .any(|info| info.identifier == "id2" && info.waiters == 1)
        });

        let err = locks.obtain_lock("id1").unwrap_err();
        assert!(err.is_deadlock());
        assert!(locks.has_lock("id2"));
        assert!(!locks.has_lock("id1"));

        locks.release_lock("id2").unwrap();
        other.join().unwrap();
    });

    assert!(locks.is_empty());
}

#[test]
#[serial]
fn test_interrupt_aborts_blocked_acquisition() {
    // A long poll interval proves the interrupt wakes the waiter directly.
    let config = LockConfig {
        poll_interval_ms: 60_000,
        ..LockConfig::default()
    };
    let locks = Arc::new(IdentifierLock::<String>::with_config(&config));
    locks.obtain_lock(IDENTIFIER).unwrap();

    let (handle_tx, handle_rx) = mpsc::channel();
    let waiter = thread::spawn({
        let locks = Arc::clone(&locks);
        move || {
            handle_tx.send(locks.interrupt_handle()).unwrap();
            let result = locks.obtain_lock(IDENTIFIER);
            (result, locks.has_lock(IDENTIFIER))
        }
    });

    let handle = handle_rx.recv().unwrap();
    wait_until(|| locks.list_locks().first().is_some_and(|info| info.waiters == 1));
    handle.interrupt();

    let (result, held) = within(Duration::from_secs(5), move || waiter.join().unwrap());
    assert!(matches!(result, Err(LockError::AcquisitionFailed(_))));
    assert!(!held);
    assert!(!handle.is_pending());

    // No waiter registration is left behind, so release disposes the entry.
    assert_eq!(locks.list_locks()[0].waiters, 0);
    locks.release_lock(IDENTIFIER).unwrap();
    assert!(locks.is_empty());
}

#[test]
#[serial]
fn test_pending_interrupt_is_consumed_by_next_blocking_wait() {
    let locks = fast_registry();
    let handle = locks.interrupt_handle();
    handle.interrupt();

    // Uncontended acquisitions never wait, so the interrupt stays pending.
    locks.obtain_lock("free").unwrap();
    locks.release_lock("free").unwrap();
    assert!(handle.is_pending());

    let holding = Barrier::new(2);
    let done = Barrier::new(2);
    thread::scope(|s| {
        s.spawn(|| {
            locks.obtain_lock("busy").unwrap();
            holding.wait();
            done.wait();
            locks.release_lock("busy").unwrap();
        });

        holding.wait();
        let err = locks.obtain_lock("busy").unwrap_err();
        assert!(matches!(err, LockError::AcquisitionFailed(_)));
        assert!(!handle.is_pending());
        done.wait();
    });

    assert!(locks.is_empty());
}

#[test]
fn test_guard_releases_on_drop() {
    let locks: IdentifierLock = IdentifierLock::new();

    {
        let guard = locks.lock(IDENTIFIER).unwrap();
        assert_eq!(guard.identifier(), IDENTIFIER);
        assert!(locks.has_lock(IDENTIFIER));

        let nested = locks.lock(IDENTIFIER).unwrap();
        drop(nested);
        assert!(locks.has_lock(IDENTIFIER));
    }

    assert!(!locks.has_lock(IDENTIFIER));
    assert!(locks.is_empty());
}

#[test]
fn test_guard_manual_release() {
    let locks: IdentifierLock = IdentifierLock::new();

    let guard = locks.lock(IDENTIFIER).unwrap();
    guard.release().unwrap();

    assert!(locks.is_empty());
}

#[test]
fn test_list_locks_reports_holders() {
    let locks: IdentifierLock = IdentifierLock::new();
    locks.obtain_lock("b").unwrap();
    locks.obtain_lock("a").unwrap();
    locks.obtain_lock("a").unwrap();

    let infos = locks.list_locks();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].identifier, "a");
    assert_eq!(infos[0].hold_count, 2);
    assert_eq!(infos[0].owner, Some(thread::current().id()));
    assert_eq!(infos[1].owner, Some(thread::current().id()));
    assert!(infos[0].to_string().contains("holds: 2"));

    locks.release_lock("a").unwrap();
    locks.release_lock("a").unwrap();
    locks.release_lock("b").unwrap();
    assert!(locks.list_locks().is_empty());
}

#[test]
fn test_non_string_identifiers() {
    let locks: IdentifierLock<u64> = IdentifierLock::new();

    locks.obtain_lock(&7u64).unwrap();
    assert!(locks.has_lock(&7u64));
    assert!(!locks.has_lock(&8u64));
    locks.release_lock(&7u64).unwrap();
    assert!(locks.is_empty());
}
