//! The weighted decision rule.

use upgrade_types::{Tally, TallyOutcome, Vote, VoteDecision};

use crate::config::VotingConfig;

/// Apply the decision rule to a set of live votes.
///
/// Pure and deterministic: the result depends only on the weights and
/// decisions in `votes`, never on their order.
///
/// - quorum met and `approve / (approve + reject) >= threshold` → approved
/// - quorum met otherwise (including abstain-only quorum) → rejected
/// - quorum not met → pending
pub fn tally_votes(votes: &[Vote], config: &VotingConfig) -> Tally {
    let mut tally = Tally {
        approve_weight: 0,
        reject_weight: 0,
        abstain_weight: 0,
        voter_count: votes.len(),
        quorum: config.quorum,
        approval_threshold: config.approval_threshold,
        outcome: TallyOutcome::Pending,
    };

    for vote in votes {
        let weight = u64::from(vote.weight);
        match vote.decision {
            VoteDecision::Approve => tally.approve_weight += weight,
            VoteDecision::Reject => tally.reject_weight += weight,
            VoteDecision::Abstain => tally.abstain_weight += weight,
        }
    }

    tally.outcome = if !tally.quorum_met() {
        TallyOutcome::Pending
    } else if tally.approval_ratio() >= config.approval_threshold {
        TallyOutcome::Approved
    } else {
        TallyOutcome::Rejected
    };
    tally
}
