//! Rollback manager: restores a component's previous implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};
use upgrade_registry::ProposalRegistry;
use upgrade_store::RollbackStore;
use upgrade_types::{
    Clock, ComponentId, ImplementationRef, ProposalId, ProposalStatus, RollbackRecord,
    RollbackTrigger,
};

use crate::error::{DeployError, Result};
use crate::ledger::{LedgerClient, LedgerError};
use crate::locks::{ComponentGuard, ComponentLocks};

/// Restores component pointers and keeps the rollback log.
///
/// Every attempt that reaches the ledger is recorded, including no-ops and
/// failures. A failed restore is returned as [`DeployError::RollbackFailed`]
/// and is never retried here.
pub struct RollbackManager {
    registry: Arc<ProposalRegistry>,
    ledger: Arc<dyn LedgerClient>,
    log: Arc<dyn RollbackStore>,
    locks: Arc<ComponentLocks>,
    clock: Arc<dyn Clock>,
    step_timeout: Duration,
}

impl RollbackManager {
    pub fn new(
        registry: Arc<ProposalRegistry>,
        ledger: Arc<dyn LedgerClient>,
        log: Arc<dyn RollbackStore>,
        locks: Arc<ComponentLocks>,
        clock: Arc<dyn Clock>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            ledger,
            log,
            locks,
            clock,
            step_timeout,
        }
    }

    /// Roll back a deployed proposal to the implementation it replaced.
    ///
    /// A failed attempt leaves the proposal `Deployed` and annotates its
    /// audit trail.
    #[instrument(skip(self, reason), fields(proposal = %proposal_id))]
    pub async fn rollback_proposal(
        &self,
        proposal_id: &ProposalId,
        reason: &str,
        actor: &str,
    ) -> Result<RollbackRecord> {
        let proposal = self.registry.get(proposal_id).await?;
        if proposal.status != ProposalStatus::Deployed {
            return Err(DeployError::InvalidState {
                id: *proposal_id,
                status: proposal.status,
                reason: "only deployed proposals can be rolled back".into(),
            });
        }
        let record = proposal.deployment_record.ok_or_else(|| DeployError::InvalidState {
            id: *proposal_id,
            status: proposal.status,
            reason: "no deployment record".into(),
        })?;

        let guard = self.locks.acquire(&proposal.target_component).await?;
        let restore_ref = &record.previous_implementation_ref;

        // Refuse to clobber a newer deployment of the same component.
        let live = match self.bounded(self.ledger.current_ref(guard.component())).await {
            Ok(live) => live,
            Err(failure) => {
                let attempt = self.attempt(
                    Some(*proposal_id),
                    guard.component(),
                    restore_ref,
                    reason,
                    RollbackTrigger::Manual,
                    actor,
                );
                let err = self.record_failure(attempt, failure).await;
                self.annotate_failure(proposal_id, &err, actor).await;
                return Err(err);
            }
        };
        if live != record.new_implementation_ref && live != *restore_ref {
            return Err(DeployError::InvalidState {
                id: *proposal_id,
                status: proposal.status,
                reason: format!("{} has since moved to {live}", proposal.target_component),
            });
        }

        let rollback = match self
            .restore_locked(
                &guard,
                Some(*proposal_id),
                restore_ref,
                reason,
                RollbackTrigger::Manual,
                actor,
            )
            .await
        {
            Ok(rollback) => rollback,
            Err(err) => {
                self.annotate_failure(proposal_id, &err, actor).await;
                return Err(err);
            }
        };

        self.registry
            .transition(
                proposal_id,
                ProposalStatus::Deployed,
                ProposalStatus::RolledBack,
                actor,
                &format!("rolled back to {}: {reason}", rollback.restored_implementation_ref),
            )
            .await?;
        Ok(rollback)
    }

    /// Ad-hoc rollback of a component outside any proposal.
    #[instrument(skip(self, reason), fields(component = %component))]
    pub async fn rollback_component(
        &self,
        component: &ComponentId,
        restore_ref: &ImplementationRef,
        reason: &str,
        actor: &str,
    ) -> Result<RollbackRecord> {
        let guard = self.locks.acquire(component).await?;
        self.restore_locked(&guard, None, restore_ref, reason, RollbackTrigger::Manual, actor)
            .await
    }

    /// Repoint the guarded component to `restore_ref`.
    ///
    /// Callers must already hold the component lock; the guard is the proof.
    /// The attempt is logged whether or not the restore completes.
    pub async fn restore_locked(
        &self,
        guard: &ComponentGuard,
        proposal_id: Option<ProposalId>,
        restore_ref: &ImplementationRef,
        reason: &str,
        trigger: RollbackTrigger,
        actor: &str,
    ) -> Result<RollbackRecord> {
        let component = guard.component();
        let mut record = self.attempt(proposal_id, component, restore_ref, reason, trigger, actor);

        if let Err(failure) = self.repoint(component, restore_ref, &mut record).await {
            return Err(self.record_failure(record, failure).await);
        }

        record.rolled_back_at = self.clock.now();
        if let Err(e) = self.log.record_rollback(record.clone()).await {
            error!(%component, restored = %restore_ref, error = %e, "rollback applied but not recorded");
            return Err(e.into());
        }

        info!(
            %component,
            restored = %restore_ref,
            no_op = record.no_op,
            ?trigger,
            "rollback recorded"
        );
        Ok(record)
    }

    /// Rollback attempts recorded for `component`, oldest first.
    pub async fn history(&self, component: &ComponentId) -> Result<Vec<RollbackRecord>> {
        Ok(self.log.rollbacks_for(component).await?)
    }

    async fn repoint(
        &self,
        component: &ComponentId,
        restore_ref: &ImplementationRef,
        record: &mut RollbackRecord,
    ) -> std::result::Result<(), String> {
        let replaced = self.bounded(self.ledger.current_ref(component)).await?;
        record.no_op = replaced == *restore_ref;
        record.replaced_implementation_ref = Some(replaced);
        if record.no_op {
            return Ok(());
        }

        self.bounded(self.ledger.repoint(component, restore_ref)).await?;
        let live = self.bounded(self.ledger.current_ref(component)).await?;
        if live != *restore_ref {
            return Err(format!(
                "ledger still points at {live} after repoint to {restore_ref}"
            ));
        }
        Ok(())
    }

    fn attempt(
        &self,
        proposal_id: Option<ProposalId>,
        component: &ComponentId,
        restore_ref: &ImplementationRef,
        reason: &str,
        trigger: RollbackTrigger,
        actor: &str,
    ) -> RollbackRecord {
        RollbackRecord {
            proposal_id,
            target_component: component.clone(),
            reason: reason.to_string(),
            trigger,
            replaced_implementation_ref: None,
            restored_implementation_ref: restore_ref.clone(),
            no_op: false,
            failure: None,
            actor: actor.to_string(),
            rolled_back_at: self.clock.now(),
        }
    }

    /// Log the failed attempt and build the fatal error.
    async fn record_failure(&self, mut record: RollbackRecord, failure: String) -> DeployError {
        record.rolled_back_at = self.clock.now();
        record.failure = Some(failure.clone());
        if let Err(e) = self.log.record_rollback(record.clone()).await {
            error!(component = %record.target_component, error = %e, "failed rollback not recorded");
        }
        self.failed(&record.target_component, failure)
    }

    async fn annotate_failure(&self, proposal_id: &ProposalId, err: &DeployError, actor: &str) {
        let detail = format!("rollback attempt failed: {err}");
        if let Err(e) = self
            .registry
            .annotate(proposal_id, ProposalStatus::Deployed, actor, &detail)
            .await
        {
            warn!(proposal = %proposal_id, error = %e, "rollback failure not audited");
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = std::result::Result<T, LedgerError>>,
    ) -> std::result::Result<T, String> {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}ms", self.step_timeout.as_millis())),
        }
    }

    fn failed(&self, component: &ComponentId, reason: String) -> DeployError {
        error!(%component, %reason, "rollback failed, operator intervention required");
        DeployError::RollbackFailed {
            component: component.clone(),
            reason,
        }
    }
}
