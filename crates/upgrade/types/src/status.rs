//! Proposal lifecycle.
//!
//! ```text
//! Proposed → Voting → {Approved, Rejected, Cancelled}
//! Approved → Testing → {Staged, Failed, Cancelled}
//! Staged → Deploying → {Deployed, Failed}
//! Deployed → RolledBack
//! ```
//!
//! The table in [`ProposalStatus::successors`] is the single source of truth
//! for legal transitions; the registry refuses anything else.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an upgrade proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
    Voting,
    Approved,
    Rejected,
    Testing,
    Staged,
    Deploying,
    Deployed,
    Failed,
    Cancelled,
    RolledBack,
}

impl ProposalStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ProposalStatus; 11] = [
        Self::Proposed,
        Self::Voting,
        Self::Approved,
        Self::Rejected,
        Self::Testing,
        Self::Staged,
        Self::Deploying,
        Self::Deployed,
        Self::Failed,
        Self::Cancelled,
        Self::RolledBack,
    ];

    /// Statuses reachable in one step from `self`.
    pub fn successors(self) -> &'static [ProposalStatus] {
        use ProposalStatus::*;
        match self {
            Proposed => &[Voting],
            Voting => &[Approved, Rejected, Cancelled],
            Approved => &[Testing],
            Testing => &[Staged, Failed, Cancelled],
            Staged => &[Deploying],
            Deploying => &[Deployed, Failed],
            Deployed => &[RolledBack],
            Rejected | Failed | Cancelled | RolledBack => &[],
        }
    }

    pub fn can_transition_to(self, next: ProposalStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Whether no further transition is possible.
    ///
    /// `Deployed` is not terminal because it can still be rolled back.
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Whether the proposal can be cancelled by an operator.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Voting | Self::Testing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Voting => "voting",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Testing => "testing",
            Self::Staged => "staged",
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `path` is a walk through the lifecycle table starting at
/// `Proposed`.
///
/// Returns the index of the first offending step on failure.
pub fn validate_path(path: &[ProposalStatus]) -> Result<(), usize> {
    match path.first() {
        None => return Ok(()),
        Some(ProposalStatus::Proposed) => {}
        Some(_) => return Err(0),
    }
    for (i, pair) in path.windows(2).enumerate() {
        if !pair[0].can_transition_to(pair[1]) {
            return Err(i + 1);
        }
    }
    Ok(())
}
