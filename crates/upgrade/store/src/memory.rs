//! In-memory store used for tests, local demos, and embedding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use upgrade_types::{
    AuditDraft, AuditEntry, ComponentId, Proposal, ProposalId, ProposalStatus, RollbackRecord,
    Vote, VoterId,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{AuditStore, ProposalStore, RollbackStore, VoteStore};

/// Thread-safe in-memory implementation of every store boundary.
///
/// Proposals, the audit trail and the rollback log share one critical
/// section so that a CAS update and its audit entry are atomic. Votes live
/// in a concurrent map keyed per voter, so parallel voters never contend.
pub struct InMemoryStore {
    inner: Mutex<StoreState>,
    votes: DashMap<(ProposalId, VoterId), Vote>,
    available: AtomicBool,
}

#[derive(Default)]
struct StoreState {
    proposals: HashMap<ProposalId, Proposal>,
    audit: Vec<AuditEntry>,
    rollbacks: Vec<RollbackRecord>,
}

impl StoreState {
    fn seal(&mut self, mut draft: AuditDraft) -> AuditEntry {
        let last = self.audit.last();
        // Timestamps never run backwards within the trail.
        if let Some(prev) = last {
            if draft.timestamp < prev.timestamp {
                draft.timestamp = prev.timestamp;
            }
        }
        let seq = self.audit.len() as u64 + 1;
        let prev_hash = last.map(|e| e.entry_hash.clone());
        let entry = draft.seal(seq, prev_hash);
        self.audit.push(entry.clone());
        entry
    }

    fn check_status(&self, id: &ProposalId, expected: ProposalStatus) -> StoreResult<()> {
        let current = self
            .proposals
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if current.status != expected {
            return Err(StoreError::StatusMismatch {
                expected,
                actual: current.status,
            });
        }
        Ok(())
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreState::default()),
            votes: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every operation fails with
    /// [`StoreError::Unavailable`] until availability is restored.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn proposal_count(&self) -> usize {
        self.inner.lock().proposals.len()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProposalStore for InMemoryStore {
    async fn insert(&self, proposal: Proposal, audit: AuditDraft) -> StoreResult<AuditEntry> {
        self.ensure_available()?;
        let mut state = self.inner.lock();
        if state.proposals.contains_key(&proposal.id) {
            return Err(StoreError::AlreadyExists(proposal.id.to_string()));
        }
        state.proposals.insert(proposal.id, proposal);
        Ok(state.seal(audit))
    }

    async fn get(&self, id: &ProposalId) -> StoreResult<Option<Proposal>> {
        self.ensure_available()?;
        Ok(self.inner.lock().proposals.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Proposal>> {
        self.ensure_available()?;
        let mut all: Vec<Proposal> = self.inner.lock().proposals.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn compare_and_swap(
        &self,
        expected: ProposalStatus,
        proposal: Proposal,
    ) -> StoreResult<()> {
        self.ensure_available()?;
        let mut state = self.inner.lock();
        state.check_status(&proposal.id, expected)?;
        state.proposals.insert(proposal.id, proposal);
        Ok(())
    }

    async fn compare_and_swap_audited(
        &self,
        expected: ProposalStatus,
        proposal: Proposal,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry> {
        self.ensure_available()?;
        let mut state = self.inner.lock();
        state.check_status(&proposal.id, expected)?;
        state.proposals.insert(proposal.id, proposal);
        Ok(state.seal(audit))
    }
}

#[async_trait]
impl VoteStore for InMemoryStore {
    async fn upsert_vote(&self, vote: Vote) -> StoreResult<Option<Vote>> {
        self.ensure_available()?;
        let key = (vote.proposal_id, vote.voter_id.clone());
        Ok(self.votes.insert(key, vote))
    }

    async fn get_vote(
        &self,
        proposal_id: &ProposalId,
        voter_id: &VoterId,
    ) -> StoreResult<Option<Vote>> {
        self.ensure_available()?;
        Ok(self
            .votes
            .get(&(*proposal_id, voter_id.clone()))
            .map(|v| v.clone()))
    }

    async fn votes_for(&self, proposal_id: &ProposalId) -> StoreResult<Vec<Vote>> {
        self.ensure_available()?;
        let mut votes: Vec<Vote> = self
            .votes
            .iter()
            .filter(|entry| entry.key().0 == *proposal_id)
            .map(|entry| entry.value().clone())
            .collect();
        votes.sort_by(|a, b| a.cast_at.cmp(&b.cast_at).then(a.voter_id.cmp(&b.voter_id)));
        Ok(votes)
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append(&self, draft: AuditDraft) -> StoreResult<AuditEntry> {
        self.ensure_available()?;
        Ok(self.inner.lock().seal(draft))
    }

    async fn entries_for(&self, proposal_id: &ProposalId) -> StoreResult<Vec<AuditEntry>> {
        self.ensure_available()?;
        Ok(self
            .inner
            .lock()
            .audit
            .iter()
            .filter(|e| e.proposal_id == *proposal_id)
            .cloned()
            .collect())
    }

    async fn all_entries(&self) -> StoreResult<Vec<AuditEntry>> {
        self.ensure_available()?;
        Ok(self.inner.lock().audit.clone())
    }
}

#[async_trait]
impl RollbackStore for InMemoryStore {
    async fn record_rollback(&self, record: RollbackRecord) -> StoreResult<()> {
        self.ensure_available()?;
        self.inner.lock().rollbacks.push(record);
        Ok(())
    }

    async fn rollbacks_for(&self, component: &ComponentId) -> StoreResult<Vec<RollbackRecord>> {
        self.ensure_available()?;
        Ok(self
            .inner
            .lock()
            .rollbacks
            .iter()
            .filter(|r| r.target_component == *component)
            .cloned()
            .collect())
    }
}
