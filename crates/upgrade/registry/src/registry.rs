//! Proposal registry: the only writer of proposal state.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use upgrade_store::ProposalStore;
use upgrade_types::{
    AuditDraft, AuditEntry, Clock, NewProposal, Proposal, ProposalId, ProposalStatus, VoterRole,
};

use crate::error::{RegistryError, Result};

/// Owns proposals and moves them through the lifecycle.
///
/// Every status change is a compare-and-swap against the stored status and
/// writes its audit entry in the same store operation.
pub struct ProposalRegistry {
    store: Arc<dyn ProposalStore>,
    clock: Arc<dyn Clock>,
    default_roles: BTreeSet<VoterRole>,
}

impl ProposalRegistry {
    /// `default_roles` is used for proposals that do not name their own
    /// eligible roles.
    pub fn new(
        store: Arc<dyn ProposalStore>,
        clock: Arc<dyn Clock>,
        default_roles: BTreeSet<VoterRole>,
    ) -> Self {
        Self {
            store,
            clock,
            default_roles,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validate and store a new proposal in `Proposed`.
    #[instrument(skip(self, new), fields(component = %new.target_component))]
    pub async fn create(&self, new: NewProposal, actor: &str) -> Result<Proposal> {
        let now = self.clock.now();
        validate_new(&new, now)?;

        let roles = match &new.eligible_roles {
            Some(roles) if roles.is_empty() => {
                return Err(RegistryError::Validation(
                    "eligible roles must not be empty".into(),
                ))
            }
            Some(roles) => roles.clone(),
            None => self.default_roles.clone(),
        };

        let proposal = Proposal::from_new(new, roles, now);
        let draft = AuditDraft::new(
            proposal.id,
            None,
            ProposalStatus::Proposed,
            actor,
            now,
            format!(
                "{} {} -> {}",
                proposal.target_component, proposal.current_version, proposal.target_version
            ),
        );
        self.store
            .insert(proposal.clone(), draft)
            .await
            .map_err(|e| RegistryError::from_store(proposal.id, e))?;

        info!(proposal = %proposal.id, "proposal created");
        Ok(proposal)
    }

    pub async fn get(&self, id: &ProposalId) -> Result<Proposal> {
        self.store
            .get(id)
            .await
            .map_err(|e| RegistryError::from_store(*id, e))?
            .ok_or(RegistryError::NotFound(*id))
    }

    /// Proposals currently in `status`, oldest first.
    pub async fn list_by_status(&self, status: ProposalStatus) -> Result<Vec<Proposal>> {
        let all = self.store.list().await?;
        Ok(all.into_iter().filter(|p| p.status == status).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<Proposal>> {
        Ok(self.store.list().await?)
    }

    /// Move `id` from `expected` to `next`.
    pub async fn transition(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        next: ProposalStatus,
        actor: &str,
        detail: &str,
    ) -> Result<Proposal> {
        self.transition_with(id, expected, next, actor, detail, |_| {})
            .await
    }

    /// Move `id` from `expected` to `next`, applying `mutate` in the same
    /// atomic step.
    #[instrument(skip(self, mutate, detail), fields(proposal = %id, from = %expected, to = %next))]
    pub async fn transition_with<F>(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        next: ProposalStatus,
        actor: &str,
        detail: &str,
        mutate: F,
    ) -> Result<Proposal>
    where
        F: FnOnce(&mut Proposal) + Send,
    {
        if !expected.can_transition_to(next) {
            return Err(RegistryError::InvalidTransition {
                from: expected,
                to: next,
            });
        }

        let mut proposal = self.get(id).await?;
        if proposal.status != expected {
            return Err(RegistryError::Conflict {
                id: *id,
                expected,
                actual: proposal.status,
            });
        }

        let now = self.clock.now();
        mutate(&mut proposal);
        proposal.id = *id;
        proposal.status = next;
        proposal.updated_at = now;

        let draft = AuditDraft::new(*id, Some(expected), next, actor, now, detail);
        let entry = self
            .store
            .compare_and_swap_audited(expected, proposal.clone(), draft)
            .await
            .map_err(|e| RegistryError::from_store(*id, e))?;

        info!(seq = entry.seq, actor, "proposal transitioned");
        Ok(proposal)
    }

    /// Update non-status fields while the proposal is still in `expected`.
    ///
    /// No audit entry is written.
    pub async fn amend<F>(&self, id: &ProposalId, expected: ProposalStatus, mutate: F) -> Result<Proposal>
    where
        F: FnOnce(&mut Proposal) + Send,
    {
        let mut proposal = self.get(id).await?;
        if proposal.status != expected {
            return Err(RegistryError::Conflict {
                id: *id,
                expected,
                actual: proposal.status,
            });
        }

        mutate(&mut proposal);
        proposal.id = *id;
        proposal.status = expected;
        proposal.updated_at = self.clock.now();

        self.store
            .compare_and_swap(expected, proposal.clone())
            .await
            .map_err(|e| RegistryError::from_store(*id, e))?;
        debug!(proposal = %id, "proposal amended");
        Ok(proposal)
    }

    /// Audit an event against `id` while it is still in `expected`,
    /// without changing its status.
    #[instrument(skip(self, detail), fields(proposal = %id, status = %expected))]
    pub async fn annotate(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        actor: &str,
        detail: &str,
    ) -> Result<AuditEntry> {
        let proposal = self.get(id).await?;
        if proposal.status != expected {
            return Err(RegistryError::Conflict {
                id: *id,
                expected,
                actual: proposal.status,
            });
        }

        let draft = AuditDraft::annotation(*id, expected, actor, self.clock.now(), detail);
        let entry = self
            .store
            .compare_and_swap_audited(expected, proposal, draft)
            .await
            .map_err(|e| RegistryError::from_store(*id, e))?;
        info!(seq = entry.seq, actor, "proposal annotated");
        Ok(entry)
    }
}

fn validate_new(new: &NewProposal, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    if new.target_component.is_blank() {
        return Err(RegistryError::Validation("target component is blank".into()));
    }
    if new.current_version.trim().is_empty() {
        return Err(RegistryError::Validation("current version is blank".into()));
    }
    if new.target_version.trim().is_empty() {
        return Err(RegistryError::Validation("target version is blank".into()));
    }
    if new.current_version.trim() == new.target_version.trim() {
        return Err(RegistryError::Validation(format!(
            "target version {} equals current version",
            new.target_version
        )));
    }
    if new.implementation_payload.is_empty() {
        return Err(RegistryError::Validation(
            "implementation payload is empty".into(),
        ));
    }
    if new.voting_deadline <= now {
        return Err(RegistryError::Validation(
            "voting deadline must be in the future".into(),
        ));
    }
    Ok(())
}
