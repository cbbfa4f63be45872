//! CLI argument parsing for idlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand, ValueEnum};
use idlock::config::AcquireOrdering;
use std::path::PathBuf;

/// idlock: per-identifier reentrant locks with deadlock detection.
///
/// Runs the lock manager through scripted scenarios and stress workloads:
/// - Reentrant acquisition and cleanup of a single identifier
/// - Lock cycles between N threads, resolved by deadlock detection
/// - Many threads hammering a small set of identifiers
#[derive(Parser, Debug)]
#[command(name = "idlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log lock activity at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for idlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scripted scenario.
    Demo(DemoCommand),

    /// Hammer a shared registry from many threads and report the outcome.
    ///
    /// Flags override the `stress` section of the configuration.
    Stress(StressArgs),

    /// Print the effective configuration as YAML.
    Config,
}

/// Demo subcommands.
#[derive(Parser, Debug)]
pub struct DemoCommand {
    #[command(subcommand)]
    pub scenario: DemoScenario,
}

/// Available demo scenarios.
#[derive(Subcommand, Debug)]
pub enum DemoScenario {
    /// Lock one identifier repeatedly, then release it as many times.
    Reentrant(ReentrantArgs),

    /// Close a lock cycle between N threads and watch it get refused.
    Deadlock(DeadlockArgs),
}

/// Arguments for `demo reentrant`.
#[derive(Parser, Debug)]
pub struct ReentrantArgs {
    /// Identifier to lock.
    #[arg(long, default_value = "aggregate-1")]
    pub identifier: String,

    /// Number of nested acquisitions.
    #[arg(long, default_value_t = 3)]
    pub depth: usize,
}

/// Arguments for `demo deadlock`.
#[derive(Parser, Debug)]
pub struct DeadlockArgs {
    /// Number of threads in the cycle (at least 2).
    #[arg(long, default_value_t = 2)]
    pub parties: usize,
}

/// Arguments for the `stress` command.
#[derive(Parser, Debug)]
pub struct StressArgs {
    /// Number of worker threads.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Number of distinct identifiers.
    #[arg(long)]
    pub identifiers: Option<usize>,

    /// Lock/unlock rounds per worker.
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Maximum number of identifiers a worker holds at once.
    #[arg(long)]
    pub max_nesting: Option<usize>,

    /// Order in which a worker takes its nested locks.
    #[arg(long, value_enum)]
    pub ordering: Option<OrderingArg>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Command-line spelling of [`AcquireOrdering`].
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingArg {
    Sorted,
    Random,
}

impl From<OrderingArg> for AcquireOrdering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Sorted => AcquireOrdering::Sorted,
            OrderingArg::Random => AcquireOrdering::Random,
        }
    }
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
