//! Votes and weighted tallies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProposalId, VoterId, VoterRole};

/// A voter's decision on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDecision {
    Approve,
    Reject,
    Abstain,
}

impl std::fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::Abstain => write!(f, "abstain"),
        }
    }
}

/// The live vote of one voter on one proposal.
///
/// Keyed by `(proposal_id, voter_id)`; a later vote replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub voter_id: VoterId,
    pub voter_role: VoterRole,
    pub decision: VoteDecision,
    pub justification: String,
    pub cast_at: DateTime<Utc>,
    /// Weight resolved from the role at cast time.
    pub weight: u32,
}

/// Result of applying the decision rule to a vote set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyOutcome {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for TallyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Weighted tally of the live votes on a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub approve_weight: u64,
    pub reject_weight: u64,
    pub abstain_weight: u64,
    pub voter_count: usize,
    pub quorum: u64,
    pub approval_threshold: f64,
    pub outcome: TallyOutcome,
}

impl Tally {
    pub fn total_cast(&self) -> u64 {
        self.approve_weight + self.reject_weight + self.abstain_weight
    }

    pub fn quorum_met(&self) -> bool {
        self.total_cast() >= self.quorum
    }

    /// `approve / (approve + reject)`; abstentions are not in the
    /// denominator. Zero when nobody approved or rejected.
    pub fn approval_ratio(&self) -> f64 {
        let decisive = self.approve_weight + self.reject_weight;
        if decisive == 0 {
            return 0.0;
        }
        self.approve_weight as f64 / decisive as f64
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tally(approve={}, reject={}, abstain={}, quorum={}/{}, ratio={:.2}, outcome={})",
            self.approve_weight,
            self.reject_weight,
            self.abstain_weight,
            self.total_cast(),
            self.quorum,
            self.approval_ratio(),
            self.outcome,
        )
    }
}
