//! Configuration types and defaults for idlock.
//!
//! This module defines enums, nested sections and default value functions
//! used by the LockConfig struct.

use serde::{Deserialize, Serialize};

/// Order in which a stress worker takes its nested locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcquireOrdering {
    /// Identifiers are taken in ascending order, so no cycle can form.
    #[default]
    Sorted,
    /// Identifiers are taken in random order; deadlocks get detected and refused.
    Random,
}

impl AcquireOrdering {
    /// Parse an ordering from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sorted" => Some(Self::Sorted),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquireOrdering::Sorted => "sorted",
            AcquireOrdering::Random => "random",
        }
    }
}

/// Parameters for the stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressSettings {
    /// Number of worker threads.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Number of distinct identifiers shared by the workers.
    #[serde(default = "default_identifiers")]
    pub identifiers: usize,

    /// Lock/unlock rounds per worker.
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Maximum number of distinct identifiers held at once by one worker.
    #[serde(default = "default_max_nesting")]
    pub max_nesting: usize,

    /// Acquisition order within a round.
    #[serde(default)]
    pub ordering: AcquireOrdering,
}

impl Default for StressSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            identifiers: default_identifiers(),
            iterations: default_iterations(),
            max_nesting: default_max_nesting(),
            ordering: AcquireOrdering::default(),
        }
    }
}

// Default value functions for serde
pub(crate) fn default_poll_interval_ms() -> u64 {
    100
}
pub(crate) fn default_threads() -> usize {
    8
}
pub(crate) fn default_identifiers() -> usize {
    4
}
pub(crate) fn default_iterations() -> usize {
    1000
}
pub(crate) fn default_max_nesting() -> usize {
    3
}
