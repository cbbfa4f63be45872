//! Exit code constants for the idlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, illegal release)
//! - 2: Configuration failure
//! - 3: Deadlock refused
//! - 4: Lock acquisition failure (interrupted wait)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or a release that violates the lock discipline.
pub const USER_ERROR: i32 = 1;

/// Configuration file could not be read, parsed or validated.
pub const CONFIG_FAILURE: i32 = 2;

/// An acquisition was refused because it would have deadlocked.
pub const DEADLOCK: i32 = 3;

/// Lock acquisition failure: the wait was interrupted.
pub const LOCK_FAILURE: i32 = 4;
