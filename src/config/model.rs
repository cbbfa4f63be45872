//! LockConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an identifier lock registry and the CLI driving it.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Milliseconds a blocked acquisition waits before re-running the
    /// deadlock check.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // =========================================================================
    // Stress settings
    // =========================================================================
    /// Parameters for `idlock stress`.
    #[serde(default)]
    pub stress: StressSettings,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stress: StressSettings::default(),
        }
    }
}

impl LockConfig {
    /// The bounded wait applied to each acquisition attempt.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
