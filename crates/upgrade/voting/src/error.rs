use chrono::{DateTime, Utc};
use thiserror::Error;
use upgrade_store::StoreError;
use upgrade_types::{ProposalId, ProposalStatus, VoterId, VoterRole};

/// Errors from casting votes and computing tallies.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VotingError {
    #[error("proposal not found: {0}")]
    NotFound(ProposalId),

    #[error("unknown voter: {0}")]
    UnknownVoter(VoterId),

    #[error("{id} is not open for voting (status {status})")]
    InvalidState { id: ProposalId, status: ProposalStatus },

    #[error("voting window for {id} closed at {deadline}")]
    ExpiredVotingWindow {
        id: ProposalId,
        deadline: DateTime<Utc>,
    },

    #[error("{voter} may not vote as {role}: {reason}")]
    UnauthorizedVoter {
        voter: VoterId,
        role: VoterRole,
        reason: String,
    },

    #[error("invalid vote: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, VotingError>;
