//! Store error types.

use thiserror::Error;
use upgrade_types::ProposalStatus;

/// Errors returned by durable store backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The compare-and-swap precondition did not hold.
    #[error("status mismatch: expected {expected}, found {actual}")]
    StatusMismatch {
        expected: ProposalStatus,
        actual: ProposalStatus,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
