//! Voting configuration: quorum, threshold and role weights.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use upgrade_types::VoterRole;

use crate::error::{Result, VotingError};

/// Decision rule parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Minimum total weight cast (abstentions included) for a binding tally.
    pub quorum: u64,
    /// Minimum `approve / (approve + reject)` ratio to approve.
    pub approval_threshold: f64,
    pub role_weights: BTreeMap<VoterRole, u32>,
    /// Voting window applied when a caller does not pick a deadline.
    pub default_voting_period_secs: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        let role_weights = [
            ("admin", 3),
            ("technical-committee", 2),
            ("institutional-representative", 2),
            ("auditor", 2),
            ("student-representative", 1),
        ]
        .into_iter()
        .map(|(role, weight)| (VoterRole::new(role), weight))
        .collect();

        Self {
            quorum: 5,
            approval_threshold: 0.66,
            role_weights,
            default_voting_period_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl VotingConfig {
    pub fn weight_for(&self, role: &VoterRole) -> Option<u32> {
        self.role_weights.get(role).copied()
    }

    /// Every role with a configured weight.
    pub fn roles(&self) -> BTreeSet<VoterRole> {
        self.role_weights.keys().cloned().collect()
    }

    pub fn with_role(mut self, role: impl Into<String>, weight: u32) -> Self {
        self.role_weights.insert(VoterRole::new(role), weight);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.quorum == 0 {
            return Err(VotingError::Validation("quorum must be positive".into()));
        }
        if !(self.approval_threshold > 0.0 && self.approval_threshold <= 1.0) {
            return Err(VotingError::Validation(format!(
                "approval threshold {} outside (0, 1]",
                self.approval_threshold
            )));
        }
        if self.role_weights.is_empty() {
            return Err(VotingError::Validation("no voter roles configured".into()));
        }
        if let Some((role, _)) = self.role_weights.iter().find(|(_, w)| **w == 0) {
            return Err(VotingError::Validation(format!("role {role} has zero weight")));
        }
        if self.default_voting_period_secs == 0 {
            return Err(VotingError::Validation(
                "default voting period must be positive".into(),
            ));
        }
        Ok(())
    }
}
