//! Aggregate statistics over every known proposal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use upgrade_types::{Proposal, ProposalStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernorSummary {
    pub total: usize,
    pub by_status: BTreeMap<ProposalStatus, usize>,
    /// Proposals that still need a decision or action.
    pub in_flight: usize,
    pub audit_entries: usize,
}

impl GovernorSummary {
    pub fn from_proposals(proposals: &[Proposal], audit_entries: usize) -> Self {
        let mut by_status = BTreeMap::new();
        for p in proposals {
            *by_status.entry(p.status).or_insert(0) += 1;
        }
        let in_flight = proposals
            .iter()
            .filter(|p| !p.status.is_terminal() && p.status != ProposalStatus::Deployed)
            .count();
        Self {
            total: proposals.len(),
            by_status,
            in_flight,
            audit_entries,
        }
    }

    pub fn count(&self, status: ProposalStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for GovernorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GovernorSummary(total={}, in_flight={}, deployed={}, rejected={}, failed={}, rolled_back={}, cancelled={}, audit_entries={})",
            self.total,
            self.in_flight,
            self.count(ProposalStatus::Deployed),
            self.count(ProposalStatus::Rejected),
            self.count(ProposalStatus::Failed),
            self.count(ProposalStatus::RolledBack),
            self.count(ProposalStatus::Cancelled),
            self.audit_entries,
        )
    }
}
