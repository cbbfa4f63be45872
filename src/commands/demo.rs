//! Implementation of the `idlock demo` scenarios.
//!
//! - `reentrant`: nests acquisitions of one identifier and shows the entry
//!   disappearing only after the last release
//! - `deadlock`: every thread holds its own identifier and then asks for its
//!   neighbour's, closing a cycle that the lock manager refuses

use crate::cli::{DeadlockArgs, ReentrantArgs};
use idlock::config::LockConfig;
use idlock::error::{LockError, Result};
use idlock::locks::IdentifierLock;
use std::sync::Barrier;
use std::thread;
use std::time::Instant;

/// How one participant of the deadlock scenario finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PartyOutcome {
    /// Got both locks and released them.
    Completed,
    /// Its second acquisition was refused as a deadlock.
    Refused,
}

/// Execute `idlock demo reentrant`.
pub fn cmd_reentrant(config: &LockConfig, args: ReentrantArgs) -> Result<()> {
    if args.depth == 0 {
        return Err(LockError::UserError(
            "--depth must be at least 1".to_string(),
        ));
    }

    let locks: IdentifierLock = IdentifierLock::with_config(config);
    let id = args.identifier.as_str();

    for depth in 1..=args.depth {
        locks.obtain_lock(id)?;
        println!(
            "obtain  {:<16} depth {}  has_lock={}  entries={}",
            id,
            depth,
            locks.has_lock(id),
            locks.len()
        );
    }

    for depth in (0..args.depth).rev() {
        locks.release_lock(id)?;
        println!(
            "release {:<16} depth {}  has_lock={}  entries={}",
            id,
            depth,
            locks.has_lock(id),
            locks.len()
        );
    }

    Ok(())
}

/// Execute `idlock demo deadlock`.
pub fn cmd_deadlock(config: &LockConfig, args: DeadlockArgs) -> Result<()> {
    if args.parties < 2 {
        return Err(LockError::UserError(
            "--parties must be at least 2 to form a cycle".to_string(),
        ));
    }

    let locks: IdentifierLock = IdentifierLock::with_config(config);
    let started = Instant::now();
    let outcomes = run_cycle(&locks, args.parties)?;

    println!("Lock cycle between {} threads", args.parties);
    for (party, outcome) in outcomes.iter().enumerate() {
        let (first, second) = cycle_identifiers(party, args.parties);
        let verdict = match outcome {
            PartyOutcome::Completed => "completed",
            PartyOutcome::Refused => "refused (deadlock)",
        };
        println!("  thread {}: holds {} wants {} -> {}", party, first, second, verdict);
    }
    println!(
        "Resolved in {}ms, {} entries left",
        started.elapsed().as_millis(),
        locks.len()
    );

    Ok(())
}

fn cycle_identifiers(party: usize, parties: usize) -> (String, String) {
    (
        format!("id{}", party + 1),
        format!("id{}", (party + 1) % parties + 1),
    )
}

/// Let `parties` threads each take their own identifier, then all ask for
/// the next one around the ring.
pub(crate) fn run_cycle(locks: &IdentifierLock, parties: usize) -> Result<Vec<PartyOutcome>> {
    let holding = Barrier::new(parties);

    thread::scope(|s| {
        let workers: Vec<_> = (0..parties)
            .map(|party| {
                let holding = &holding;
                s.spawn(move || {
                    let (first, second) = cycle_identifiers(party, parties);
                    locks.obtain_lock(&first)?;
                    holding.wait();

                    let outcome = match locks.obtain_lock(&second) {
                        Ok(()) => {
                            locks.release_lock(&second)?;
                            PartyOutcome::Completed
                        }
                        Err(LockError::Deadlock(_)) => PartyOutcome::Refused,
                        Err(err) => {
                            locks.release_lock(&first)?;
                            return Err(err);
                        }
                    };

                    locks.release_lock(&first)?;
                    Ok(outcome)
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}
