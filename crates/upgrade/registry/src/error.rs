//! Registry and audit trail errors.

use thiserror::Error;
use upgrade_store::StoreError;
use upgrade_types::{ProposalId, ProposalStatus};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("invalid proposal: {0}")]
    Validation(String),

    #[error("proposal not found: {0}")]
    NotFound(ProposalId),

    /// Lost a compare-and-swap race; re-read and retry.
    #[error("conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: ProposalId,
        expected: ProposalStatus,
        actual: ProposalStatus,
    },

    #[error("illegal transition {from} -> {to}")]
    InvalidTransition {
        from: ProposalStatus,
        to: ProposalStatus,
    },

    /// Replayed audit path for a proposal is not a walk of the lifecycle.
    #[error("audit trail for {id} breaks the lifecycle at step {step}")]
    LifecycleViolation { id: ProposalId, step: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    /// Translate a store error raised while operating on `id`.
    pub(crate) fn from_store(id: ProposalId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(id),
            StoreError::StatusMismatch { expected, actual } => Self::Conflict {
                id,
                expected,
                actual,
            },
            other => Self::Store(other),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
