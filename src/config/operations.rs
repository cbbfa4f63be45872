//! Config loading, validation, and serialization.

use super::model::LockConfig;
use crate::error::{LockError, Result};
use std::path::Path;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(LockConfig)` - Successfully loaded and validated config
    /// * `Err(LockError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LockConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `poll_interval_ms` must be positive
    /// - every `stress` count must be positive
    /// - `stress.max_nesting` must not exceed `stress.identifiers`
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(LockError::Config(
                "config validation failed: poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        let stress = &self.stress;
        for (name, value) in [
            ("threads", stress.threads),
            ("identifiers", stress.identifiers),
            ("iterations", stress.iterations),
            ("max_nesting", stress.max_nesting),
        ] {
            if value == 0 {
                return Err(LockError::Config(format!(
                    "config validation failed: stress.{} must be greater than 0",
                    name
                )));
            }
        }

        if stress.max_nesting > stress.identifiers {
            return Err(LockError::Config(format!(
                "config validation failed: stress.max_nesting ({}) cannot exceed stress.identifiers ({})",
                stress.max_nesting, stress.identifiers
            )));
        }

        Ok(())
    }
}
