//! Upgrade proposals and their compatibility annotation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ComponentId, ProposalId, VoterId, VoterRole};
use crate::records::DeploymentRecord;
use crate::stage::{all_required_passed, StageResult, StageStatus, TestStage};
use crate::status::ProposalStatus;

// ── Compatibility ──────────────────────────────────────────────────────

/// Risk classification produced by compatibility analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Advisory report attached to a proposal before voting opens.
///
/// Only `migration_required` has operational effect: it gates the
/// migration test stage and the deployment migration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub breaking_api_change: bool,
    pub storage_layout_change: bool,
    pub migration_required: bool,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl CompatibilityReport {
    /// A report with no detected incompatibility.
    pub fn compatible() -> Self {
        Self {
            breaking_api_change: false,
            storage_layout_change: false,
            migration_required: false,
            risk_level: RiskLevel::Low,
            notes: vec![],
        }
    }

    /// Conservative report used when analysis could not be performed.
    pub fn unknown() -> Self {
        Self {
            breaking_api_change: true,
            storage_layout_change: true,
            migration_required: true,
            risk_level: RiskLevel::High,
            notes: vec!["compatibility analysis unavailable".into()],
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

// ── Proposal ───────────────────────────────────────────────────────────

/// Input for creating a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProposal {
    pub target_component: ComponentId,
    pub current_version: String,
    pub target_version: String,
    pub implementation_payload: Vec<u8>,
    pub description: String,
    pub proposer_id: VoterId,
    pub voting_deadline: DateTime<Utc>,
    /// Roles allowed to vote. `None` means every configured role.
    pub eligible_roles: Option<BTreeSet<VoterRole>>,
}

impl NewProposal {
    pub fn new(
        target_component: ComponentId,
        current_version: impl Into<String>,
        target_version: impl Into<String>,
        implementation_payload: Vec<u8>,
        proposer_id: VoterId,
        voting_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            target_component,
            current_version: current_version.into(),
            target_version: target_version.into(),
            implementation_payload,
            description: String::new(),
            proposer_id,
            voting_deadline,
            eligible_roles: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_eligible_roles(mut self, roles: impl IntoIterator<Item = VoterRole>) -> Self {
        self.eligible_roles = Some(roles.into_iter().collect());
        self
    }
}

/// An upgrade proposal as owned by the proposal registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub target_component: ComponentId,
    pub current_version: String,
    pub target_version: String,
    pub implementation_payload: Vec<u8>,
    pub description: String,
    pub proposer_id: VoterId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub status: ProposalStatus,
    pub eligible_roles: BTreeSet<VoterRole>,
    pub compatibility_report: Option<CompatibilityReport>,
    pub test_results: Option<Vec<StageResult>>,
    pub deployment_record: Option<DeploymentRecord>,
}

impl Proposal {
    /// Materialise a freshly created proposal in `Proposed` status.
    pub fn from_new(
        new: NewProposal,
        eligible_roles: BTreeSet<VoterRole>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProposalId::generate(),
            target_component: new.target_component,
            current_version: new.current_version,
            target_version: new.target_version,
            implementation_payload: new.implementation_payload,
            description: new.description,
            proposer_id: new.proposer_id,
            created_at,
            updated_at: created_at,
            voting_deadline: new.voting_deadline,
            status: ProposalStatus::Proposed,
            eligible_roles,
            compatibility_report: None,
            test_results: None,
            deployment_record: None,
        }
    }

    /// Whether deployment must run a data migration.
    ///
    /// A proposal without a report is treated as requiring one.
    pub fn migration_required(&self) -> bool {
        self.compatibility_report
            .as_ref()
            .map_or(true, |r| r.migration_required)
    }

    pub fn is_role_eligible(&self, role: &VoterRole) -> bool {
        self.eligible_roles.contains(role)
    }

    pub fn voting_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ProposalStatus::Voting && now <= self.voting_deadline
    }

    /// Whether the recorded pipeline results allow deployment.
    ///
    /// A skipped migration test only counts when no migration is required.
    pub fn tests_passed(&self) -> bool {
        let Some(results) = self.test_results.as_deref() else {
            return false;
        };
        let migration_skipped = results.iter().any(|r| {
            r.stage == TestStage::MigrationTest && r.required && r.status == StageStatus::Skipped
        });
        all_required_passed(results) && !(migration_skipped && self.migration_required())
    }
}
