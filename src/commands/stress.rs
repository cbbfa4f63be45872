//! Implementation of the `idlock stress` command.
//!
//! Worker threads repeatedly pick a random set of identifiers, lock them one
//! after the other (plus one reentrant re-acquisition), check that nobody
//! else is inside, and release them in reverse order. With `sorted` ordering
//! no cycle can form; with `random` ordering cycles do form and the refused
//! worker backs off by releasing what it holds.

use crate::cli::StressArgs;
use idlock::config::{AcquireOrdering, LockConfig, StressSettings};
use idlock::error::{LockError, Result};
use idlock::locks::IdentifierLock;
use rand::seq::index;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

/// Outcome of a stress run.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StressReport {
    pub threads: usize,
    pub identifiers: usize,
    pub iterations: usize,
    pub max_nesting: usize,
    pub ordering: AcquireOrdering,

    /// Rounds in which a worker got every lock it asked for.
    pub completed_rounds: usize,

    /// Acquisitions refused because they would have deadlocked.
    pub deadlocks: usize,

    /// Times a worker found another worker inside an identifier it held.
    pub exclusion_violations: usize,

    /// Registry entries still present after every worker finished.
    pub leaked_entries: usize,

    pub elapsed_ms: u64,
}

#[derive(Default)]
struct WorkerTally {
    completed_rounds: usize,
    deadlocks: usize,
}

/// Execute `idlock stress`.
pub fn cmd_stress(config: &LockConfig, args: StressArgs) -> Result<()> {
    let mut effective = config.clone();
    apply_overrides(&mut effective.stress, &args);
    effective.validate()?;

    let report = run_stress(&effective)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            LockError::UserError(format!("failed to serialize stress report: {}", e))
        })?;
        println!("{}", json);
    } else {
        print_report(&report);
    }

    check_report(&report)
}

/// Fail the run if the registry broke mutual exclusion or leaked entries.
fn check_report(report: &StressReport) -> Result<()> {
    if report.exclusion_violations > 0 {
        tracing::error!(
            violations = report.exclusion_violations,
            "mutual exclusion was violated"
        );
        return Err(LockError::InvariantViolated(format!(
            "mutual exclusion was violated {} time(s)",
            report.exclusion_violations
        )));
    }
    if report.leaked_entries > 0 {
        tracing::error!(leaked = report.leaked_entries, "lock entries leaked");
        return Err(LockError::InvariantViolated(format!(
            "{} lock entries were left in the registry",
            report.leaked_entries
        )));
    }
    Ok(())
}

fn apply_overrides(settings: &mut StressSettings, args: &StressArgs) {
    if let Some(threads) = args.threads {
        settings.threads = threads;
    }
    if let Some(identifiers) = args.identifiers {
        settings.identifiers = identifiers;
    }
    if let Some(iterations) = args.iterations {
        settings.iterations = iterations;
    }
    if let Some(max_nesting) = args.max_nesting {
        settings.max_nesting = max_nesting;
    }
    if let Some(ordering) = args.ordering {
        settings.ordering = ordering.into();
    }
}

/// Run the workload described by `config.stress` against a fresh registry.
pub(crate) fn run_stress(config: &LockConfig) -> Result<StressReport> {
    let settings = &config.stress;
    let locks: IdentifierLock = IdentifierLock::with_config(config);
    let names: Vec<String> = (0..settings.identifiers)
        .map(|i| format!("aggregate-{}", i))
        .collect();
    let inside: Vec<AtomicUsize> = names.iter().map(|_| AtomicUsize::new(0)).collect();
    let violations = AtomicUsize::new(0);

    let started = Instant::now();
    let tallies: Vec<Result<WorkerTally>> = thread::scope(|s| {
        let workers: Vec<_> = (0..settings.threads)
            .map(|_| {
                let worker = Worker {
                    locks: &locks,
                    names: &names,
                    inside: &inside,
                    violations: &violations,
                    settings,
                };
                s.spawn(move || worker.run())
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
    });
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let mut report = StressReport {
        threads: settings.threads,
        identifiers: settings.identifiers,
        iterations: settings.iterations,
        max_nesting: settings.max_nesting,
        ordering: settings.ordering,
        completed_rounds: 0,
        deadlocks: 0,
        exclusion_violations: violations.load(Ordering::SeqCst),
        leaked_entries: locks.len(),
        elapsed_ms,
    };
    for tally in tallies {
        let tally = tally?;
        report.completed_rounds += tally.completed_rounds;
        report.deadlocks += tally.deadlocks;
    }

    tracing::debug!(?report, "stress run finished");
    Ok(report)
}

struct Worker<'a> {
    locks: &'a IdentifierLock,
    names: &'a [String],
    inside: &'a [AtomicUsize],
    violations: &'a AtomicUsize,
    settings: &'a StressSettings,
}

impl Worker<'_> {
    fn run(&self) -> Result<WorkerTally> {
        let mut rng = rand::thread_rng();
        let mut tally = WorkerTally::default();

        for _ in 0..self.settings.iterations {
            let nesting = rng.gen_range(1..=self.settings.max_nesting);
            let mut picked = index::sample(&mut rng, self.names.len(), nesting).into_vec();
            if self.settings.ordering == AcquireOrdering::Sorted {
                picked.sort_unstable();
            }

            if self.round(&picked)? {
                tally.completed_rounds += 1;
            } else {
                tally.deadlocks += 1;
            }
        }

        Ok(tally)
    }

    /// Lock every picked identifier, then release them in reverse order.
    ///
    /// Returns `false` when an acquisition was refused as a deadlock.
    fn round(&self, picked: &[usize]) -> Result<bool> {
        let mut held = Vec::with_capacity(picked.len());
        let mut outcome = Ok(true);

        for &slot in picked {
            match self.locks.obtain_lock(&self.names[slot]) {
                Ok(()) => {
                    if self.inside[slot].fetch_add(1, Ordering::SeqCst) != 0 {
                        self.violations.fetch_add(1, Ordering::SeqCst);
                    }
                    held.push(slot);
                }
                Err(LockError::Deadlock(_)) => {
                    outcome = Ok(false);
                    break;
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        if outcome == Ok(true)
            && let Some(&first) = held.first()
        {
            // Reentrant acquisitions never block.
            self.locks.obtain_lock(&self.names[first])?;
            self.locks.release_lock(&self.names[first])?;
        }

        for &slot in held.iter().rev() {
            self.inside[slot].fetch_sub(1, Ordering::SeqCst);
            self.locks.release_lock(&self.names[slot])?;
        }

        outcome
    }
}

fn print_report(report: &StressReport) {
    println!(
        "Stress run ({} threads, {} identifiers, {} iterations, nesting <= {}, ordering: {})",
        report.threads,
        report.identifiers,
        report.iterations,
        report.max_nesting,
        report.ordering.as_str()
    );
    println!("  completed rounds:     {}", report.completed_rounds);
    println!("  deadlocks refused:    {}", report.deadlocks);
    println!("  exclusion violations: {}", report.exclusion_violations);
    println!("  leaked entries:       {}", report.leaked_entries);
    println!("  elapsed:              {}ms", report.elapsed_ms);
}
