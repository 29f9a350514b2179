//! Durable store boundaries.
//!
//! The core only needs create / read / compare-and-swap / append semantics.
//! Backends that implement [`ProposalStore`] must also own the audit trail:
//! a status change and its audit entry are written in one atomic step.

use async_trait::async_trait;
use upgrade_types::{
    AuditDraft, AuditEntry, ComponentId, Proposal, ProposalId, ProposalStatus, RollbackRecord,
    Vote, VoterId,
};

use crate::error::StoreResult;

/// Proposal persistence with compare-and-swap updates.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Insert a new proposal together with its creation audit entry.
    async fn insert(&self, proposal: Proposal, audit: AuditDraft) -> StoreResult<AuditEntry>;

    async fn get(&self, id: &ProposalId) -> StoreResult<Option<Proposal>>;

    /// All proposals ordered by creation time.
    async fn list(&self) -> StoreResult<Vec<Proposal>>;

    /// Replace the stored proposal if its status still equals `expected`.
    ///
    /// No audit entry is written; use this for annotations that do not
    /// change the lifecycle status.
    async fn compare_and_swap(&self, expected: ProposalStatus, proposal: Proposal)
        -> StoreResult<()>;

    /// Replace the stored proposal if its status still equals `expected`
    /// and append `audit` in the same atomic step.
    async fn compare_and_swap_audited(
        &self,
        expected: ProposalStatus,
        proposal: Proposal,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry>;
}

/// Per-voter vote persistence.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Insert or replace the vote keyed by `(proposal_id, voter_id)`.
    ///
    /// Returns the replaced vote, if any.
    async fn upsert_vote(&self, vote: Vote) -> StoreResult<Option<Vote>>;

    async fn get_vote(&self, proposal_id: &ProposalId, voter_id: &VoterId)
        -> StoreResult<Option<Vote>>;

    /// Live votes on a proposal ordered by cast time.
    async fn votes_for(&self, proposal_id: &ProposalId) -> StoreResult<Vec<Vote>>;
}

/// Append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, draft: AuditDraft) -> StoreResult<AuditEntry>;

    /// Entries for one proposal in insertion order.
    async fn entries_for(&self, proposal_id: &ProposalId) -> StoreResult<Vec<AuditEntry>>;

    /// The whole trail in sequence order.
    async fn all_entries(&self) -> StoreResult<Vec<AuditEntry>>;
}

/// Append-only rollback log.
#[async_trait]
pub trait RollbackStore: Send + Sync {
    async fn record_rollback(&self, record: RollbackRecord) -> StoreResult<()>;

    async fn rollbacks_for(&self, component: &ComponentId) -> StoreResult<Vec<RollbackRecord>>;
}

/// A backend implementing every store boundary.
pub trait UpgradeStore: ProposalStore + VoteStore + AuditStore + RollbackStore {}

impl<T> UpgradeStore for T where T: ProposalStore + VoteStore + AuditStore + RollbackStore {}
