//! Deployment and rollback errors.

use thiserror::Error;
use upgrade_registry::RegistryError;
use upgrade_store::StoreError;
use upgrade_types::{ComponentId, ProposalId, ProposalStatus};

/// External step of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployStep {
    ReadCurrent,
    Publish,
    Migrate,
    Verify,
    /// Writing the outcome to the registry.
    Record,
}

impl std::fmt::Display for DeployStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadCurrent => write!(f, "read current ref"),
            Self::Publish => write!(f, "publish"),
            Self::Migrate => write!(f, "migrate"),
            Self::Verify => write!(f, "verify"),
            Self::Record => write!(f, "record outcome"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeployError {
    #[error("proposal not found: {0}")]
    NotFound(ProposalId),

    #[error("{id} cannot proceed from {status}: {reason}")]
    InvalidState {
        id: ProposalId,
        status: ProposalStatus,
        reason: String,
    },

    /// Component locked in fail-fast mode.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A deployment step failed; at most one automatic rollback was made.
    #[error("deployment of {id} failed at {step}: {reason}")]
    DeploymentFailed {
        id: ProposalId,
        step: DeployStep,
        reason: String,
        rolled_back: bool,
    },

    /// The previous implementation could not be restored.
    #[error("rollback of {component} failed: {reason}")]
    RollbackFailed { component: ComponentId, reason: String },

    /// The outcome could not be written; the proposal is left in `status`
    /// until reconciled.
    #[error("{id} left in {status}: {reason}")]
    Stranded {
        id: ProposalId,
        status: ProposalStatus,
        reason: String,
    },

    #[error(transparent)]
    Registry(RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeployError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Registry(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Requires operator intervention.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RollbackFailed { .. }
                | Self::Stranded { .. }
                | Self::Store(StoreError::Unavailable(_))
                | Self::Registry(RegistryError::Store(StoreError::Unavailable(_)))
        )
    }
}

impl From<RegistryError> for DeployError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(id),
            other => Self::Registry(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
