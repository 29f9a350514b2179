//! Deployment, rollback and audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ComponentId, ImplementationRef, ProposalId};
use crate::status::ProposalStatus;

// ── Deployment ─────────────────────────────────────────────────────────

/// Summary of a data migration executed during deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub records_migrated: u64,
    pub duration_ms: u64,
    pub notes: String,
}

/// Outcome of post-swap verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub confirmed: bool,
    pub live_ref: ImplementationRef,
    pub detail: String,
}

/// Record of a successful deployment.
///
/// `[started_at, confirmed_at]` is the window during which the component
/// lock was held for this deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub proposal_id: ProposalId,
    pub target_component: ComponentId,
    pub environment: String,
    pub previous_implementation_ref: ImplementationRef,
    pub new_implementation_ref: ImplementationRef,
    pub started_at: DateTime<Utc>,
    pub deployed_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
    pub migration_summary: Option<MigrationSummary>,
    pub verification_result: VerificationResult,
}

impl DeploymentRecord {
    /// Whether the lock windows of two deployments overlap.
    pub fn overlaps(&self, other: &DeploymentRecord) -> bool {
        self.started_at < other.confirmed_at && other.started_at < self.confirmed_at
    }

    pub fn duration_ms(&self) -> i64 {
        (self.confirmed_at - self.started_at).num_milliseconds()
    }
}

// ── Rollback ───────────────────────────────────────────────────────────

/// What caused a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackTrigger {
    /// Post-deployment-failure rollback performed by the orchestrator.
    Automatic,
    /// Operator-initiated.
    Manual,
}

/// Record of a rollback attempt. Written for every attempt, including
/// no-ops and failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// `None` for ad-hoc rollbacks outside a proposal.
    pub proposal_id: Option<ProposalId>,
    pub target_component: ComponentId,
    pub reason: String,
    pub trigger: RollbackTrigger,
    /// `None` when the live pointer could not be read.
    pub replaced_implementation_ref: Option<ImplementationRef>,
    pub restored_implementation_ref: ImplementationRef,
    /// The component already pointed at the restored ref.
    pub no_op: bool,
    /// Why the restore did not complete; `None` on success.
    #[serde(default)]
    pub failure: Option<String>,
    pub actor: String,
    pub rolled_back_at: DateTime<Utc>,
}

impl RollbackRecord {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

// ── Audit ──────────────────────────────────────────────────────────────

/// An audit entry before the store has sequenced and sealed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDraft {
    pub proposal_id: ProposalId,
    /// `None` for the creation entry.
    pub from_status: Option<ProposalStatus>,
    pub to_status: ProposalStatus,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

impl AuditDraft {
    pub fn new(
        proposal_id: ProposalId,
        from_status: Option<ProposalStatus>,
        to_status: ProposalStatus,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            proposal_id,
            from_status,
            to_status,
            actor: actor.into(),
            timestamp,
            detail: detail.into(),
        }
    }

    /// A note against `status` that does not move the lifecycle.
    pub fn annotation(
        proposal_id: ProposalId,
        status: ProposalStatus,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(proposal_id, Some(status), status, actor, timestamp, detail)
    }

    /// Assign the sequence number and link into the hash chain.
    pub fn seal(self, seq: u64, prev_hash: Option<String>) -> AuditEntry {
        let mut entry = AuditEntry {
            seq,
            proposal_id: self.proposal_id,
            from_status: self.from_status,
            to_status: self.to_status,
            actor: self.actor,
            timestamp: self.timestamp,
            detail: self.detail,
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }
}

/// One immutable lifecycle transition in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic, starting at 1.
    pub seq: u64,
    pub proposal_id: ProposalId,
    pub from_status: Option<ProposalStatus>,
    pub to_status: ProposalStatus,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
}

impl AuditEntry {
    /// Annotations record an event without a status change.
    pub fn is_annotation(&self) -> bool {
        self.from_status == Some(self.to_status)
    }

    /// BLAKE3 over every field except `entry_hash`.
    pub fn compute_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seq.to_le_bytes());
        hasher.update(self.proposal_id.as_uuid().as_bytes());
        hasher.update(self.from_status.map_or("", |s| s.as_str()).as_bytes());
        hasher.update(b"|");
        hasher.update(self.to_status.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.actor.as_bytes());
        hasher.update(b"|");
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(self.detail.as_bytes());
        hasher.update(b"|");
        hasher.update(self.prev_hash.as_deref().unwrap_or("").as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.entry_hash
    }
}
