//! Governor-level error composition.

use thiserror::Error;
use upgrade_deploy::DeployError;
use upgrade_registry::RegistryError;
use upgrade_store::StoreError;
use upgrade_types::{ProposalId, ProposalStatus};
use upgrade_voting::VotingError;

/// Coarse classification shared by every governor error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    ExpiredVotingWindow,
    UnauthorizedVoter,
    InvalidState,
    InvalidTransition,
    DeploymentFailed,
    RollbackFailed,
    /// A proposal was left mid-deployment and needs reconciling.
    Stranded,
    StoreUnavailable,
    Config,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Voting(#[from] VotingError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("{id} cannot {action} while {status}")]
    InvalidState {
        id: ProposalId,
        status: ProposalStatus,
        action: String,
    },

    #[error("pipeline already running for {0}")]
    PipelineBusy(ProposalId),

    #[error("configuration error: {0}")]
    Config(String),

    /// A background pipeline task panicked or was aborted.
    #[error("background task for {id} aborted: {reason}")]
    TaskAborted { id: ProposalId, reason: String },
}

impl GovernorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Registry(e) => registry_kind(e),
            Self::Voting(e) => match e {
                VotingError::NotFound(_) | VotingError::UnknownVoter(_) => ErrorKind::NotFound,
                VotingError::InvalidState { .. } => ErrorKind::InvalidState,
                VotingError::ExpiredVotingWindow { .. } => ErrorKind::ExpiredVotingWindow,
                VotingError::UnauthorizedVoter { .. } => ErrorKind::UnauthorizedVoter,
                VotingError::Validation(_) => ErrorKind::Validation,
                VotingError::Store(e) => store_kind(e),
            },
            Self::Deploy(e) => match e {
                DeployError::NotFound(_) => ErrorKind::NotFound,
                DeployError::InvalidState { .. } => ErrorKind::InvalidState,
                DeployError::Conflict(_) => ErrorKind::Conflict,
                DeployError::DeploymentFailed { .. } => ErrorKind::DeploymentFailed,
                DeployError::RollbackFailed { .. } => ErrorKind::RollbackFailed,
                DeployError::Stranded { .. } => ErrorKind::Stranded,
                DeployError::Registry(e) => registry_kind(e),
                DeployError::Store(e) => store_kind(e),
            },
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::PipelineBusy(_) => ErrorKind::Conflict,
            Self::Config(_) => ErrorKind::Config,
            Self::TaskAborted { .. } => ErrorKind::Internal,
        }
    }

    /// Re-read and try again.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Needs an operator: the system may be in an inconsistent state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RollbackFailed | ErrorKind::Stranded | ErrorKind::StoreUnavailable
        )
    }
}

fn registry_kind(e: &RegistryError) -> ErrorKind {
    match e {
        RegistryError::Validation(_) => ErrorKind::Validation,
        RegistryError::NotFound(_) => ErrorKind::NotFound,
        RegistryError::Conflict { .. } => ErrorKind::Conflict,
        RegistryError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        RegistryError::LifecycleViolation { .. } => ErrorKind::InvalidTransition,
        RegistryError::Store(e) => store_kind(e),
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::AlreadyExists(_) | StoreError::StatusMismatch { .. } => ErrorKind::Conflict,
        StoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
    }
}

pub type Result<T> = std::result::Result<T, GovernorError>;
