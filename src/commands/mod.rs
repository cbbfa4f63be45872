//! Command implementations for idlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations and resolves the effective configuration they run with.

mod demo;
mod stress;

use crate::cli::{Cli, Command, DemoScenario};
use idlock::config::LockConfig;
use idlock::error::Result;
use std::path::Path;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. The configuration is
/// loaded once and shared by every command.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Demo(demo) => match demo.scenario {
            DemoScenario::Reentrant(args) => demo::cmd_reentrant(&config, args),
            DemoScenario::Deadlock(args) => demo::cmd_deadlock(&config, args),
        },
        Command::Stress(args) => stress::cmd_stress(&config, args),
        Command::Config => cmd_config(&config),
    }
}

/// Load the configuration file if one was given, defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<LockConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            LockConfig::load(path)
        }
        None => Ok(LockConfig::default()),
    }
}

fn cmd_config(config: &LockConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
