//! Append-only audit trail of lifecycle transitions.
//!
//! Entries are sequenced and hash-chained by the store. The trail can be
//! replayed per proposal and checked for tampering after the fact.

use std::sync::Arc;

use tracing::warn;
use upgrade_store::AuditStore;
use upgrade_types::{validate_path, AuditDraft, AuditEntry, ProposalId, ProposalStatus};

use crate::error::{RegistryError, Result};

/// Outcome of recomputing the hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub total_entries: usize,
    pub verified_entries: usize,
    /// Sequence number of the first entry that failed verification.
    pub first_broken_seq: Option<u64>,
    pub error_message: Option<String>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.first_broken_seq.is_none()
    }
}

pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append a non-lifecycle entry. Fails only if the store is unavailable.
    pub async fn append(&self, draft: AuditDraft) -> Result<AuditEntry> {
        Ok(self.store.append(draft).await?)
    }

    /// Entries for one proposal, in insertion order.
    pub async fn query(&self, proposal_id: &ProposalId) -> Result<Vec<AuditEntry>> {
        Ok(self.store.entries_for(proposal_id).await?)
    }

    pub async fn all(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.store.all_entries().await?)
    }

    /// Replayed status sequence for a proposal.
    pub async fn status_path(&self, proposal_id: &ProposalId) -> Result<Vec<ProposalStatus>> {
        let entries = self.query(proposal_id).await?;
        Ok(entries
            .iter()
            .filter(|e| !e.is_annotation())
            .map(|e| e.to_status)
            .collect())
    }

    /// Check that the replayed path walks the lifecycle table and that
    /// every entry starts where the previous one ended. Annotations are
    /// skipped; `step` indexes the remaining transitions.
    pub async fn validate_lifecycle(&self, proposal_id: &ProposalId) -> Result<()> {
        let entries: Vec<AuditEntry> = self
            .query(proposal_id)
            .await?
            .into_iter()
            .filter(|e| !e.is_annotation())
            .collect();
        let path: Vec<ProposalStatus> = entries.iter().map(|e| e.to_status).collect();

        if let Err(step) = validate_path(&path) {
            return Err(RegistryError::LifecycleViolation {
                id: *proposal_id,
                step,
            });
        }
        for (i, entry) in entries.iter().enumerate() {
            let expected_from = if i == 0 { None } else { Some(path[i - 1]) };
            if entry.from_status != expected_from {
                return Err(RegistryError::LifecycleViolation {
                    id: *proposal_id,
                    step: i,
                });
            }
        }
        Ok(())
    }

    /// Recompute the hash chain over the whole trail.
    pub async fn verify_chain(&self) -> Result<ChainVerification> {
        let entries = self.all().await?;
        let result = verify_entries(&entries);
        if let Some(seq) = result.first_broken_seq {
            warn!(seq, "audit chain broken");
        }
        Ok(result)
    }
}

/// Verify sequence numbers, hash links, entry hashes and timestamp order.
pub fn verify_entries(entries: &[AuditEntry]) -> ChainVerification {
    let mut result = ChainVerification {
        total_entries: entries.len(),
        verified_entries: 0,
        first_broken_seq: None,
        error_message: None,
    };

    for (i, entry) in entries.iter().enumerate() {
        let problem = if entry.seq != i as u64 + 1 {
            Some(format!("entry {} out of sequence at position {}", entry.seq, i))
        } else if !entry.verify_hash() {
            Some(format!("entry {} has invalid hash", entry.seq))
        } else if i > 0 {
            let prev = &entries[i - 1];
            if entry.prev_hash.as_deref() != Some(prev.entry_hash.as_str()) {
                Some(format!("entry {} has broken chain link", entry.seq))
            } else if entry.timestamp < prev.timestamp {
                Some(format!("entry {} predates its predecessor", entry.seq))
            } else {
                None
            }
        } else if entry.prev_hash.is_some() {
            Some("first entry links to a predecessor".to_string())
        } else {
            None
        };

        if let Some(message) = problem {
            result.first_broken_seq = Some(entry.seq);
            result.error_message = Some(message);
            return result;
        }
        result.verified_entries = i + 1;
    }
    result
}
