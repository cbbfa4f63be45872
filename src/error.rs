//! Error types for idlock.
//!
//! Uses thiserror for derive macros. Every variant is surfaced synchronously to
//! the caller of the operation that triggered it; nothing is retried internally.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Waiting for the lock would close a cycle in the wait-for graph.
    ///
    /// Locks already held by the refused thread stay held; releasing them is
    /// up to the caller.
    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    /// The wait was interrupted before the lock could be acquired.
    #[error("Lock acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// Release of an identifier for which no lock was ever obtained.
    #[error("Illegal release: {0}")]
    IllegalRelease(String),

    /// Release by a thread that does not currently own the lock.
    #[error("Lock not owned by current thread: {0}")]
    NotOwner(String),

    /// Configuration could not be read, parsed or validated.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A stress run observed broken mutual exclusion or leaked entries.
    #[error("Lock invariant violated: {0}")]
    InvariantViolated(String),

    /// User provided invalid arguments.
    #[error("{0}")]
    UserError(String),
}

impl LockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Deadlock(_) => exit_codes::DEADLOCK,
            LockError::AcquisitionFailed(_) => exit_codes::LOCK_FAILURE,
            LockError::IllegalRelease(_) => exit_codes::USER_ERROR,
            LockError::NotOwner(_) => exit_codes::USER_ERROR,
            LockError::Config(_) => exit_codes::CONFIG_FAILURE,
            LockError::InvariantViolated(_) => exit_codes::LOCK_FAILURE,
            LockError::UserError(_) => exit_codes::USER_ERROR,
        }
    }

    /// Whether this error is a refused acquisition due to a deadlock.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, LockError::Deadlock(_))
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
