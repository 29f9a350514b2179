//! Deployment orchestrator.
//!
//! Steps, all under the component lock:
//! 1. Check the proposal is staged with passing required results.
//! 2. Acquire the lock and move `Staged → Deploying`.
//! 3. Read the live ref, then publish (pointer swap).
//! 4. Migrate when the compatibility report requires it.
//! 5. Verify the new ref is confirmed and live.
//! 6. Record the deployment and move `Deploying → Deployed`.
//!
//! A failure in 3–6 after the swap triggers one automatic rollback while the
//! lock is still held, then `Deploying → Failed`. If that last write also
//! fails the proposal stays `Deploying` until [`DeploymentOrchestrator::reconcile`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use upgrade_registry::ProposalRegistry;
use upgrade_types::{
    Clock, DeploymentRecord, ImplementationRef, Proposal, ProposalId, ProposalStatus,
    RollbackTrigger, VerificationResult,
};

use crate::error::{DeployError, DeployStep, Result};
use crate::ledger::LedgerClient;
use crate::locks::{ComponentGuard, ComponentLocks, LockMode};
use crate::migration::{MigrationContext, MigrationRunner};
use crate::rollback::RollbackManager;

/// Reason recorded on automatic rollbacks.
pub const DEPLOYMENT_FAILED_REASON: &str = "deployment_failed";

// ── Configuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Label written into every deployment record.
    pub environment: String,
    pub lock_mode: LockMode,
    /// Upper bound on each ledger or migration call.
    pub step_timeout_ms: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            environment: "production".into(),
            lock_mode: LockMode::Block,
            step_timeout_ms: 30_000,
        }
    }
}

impl DeploymentConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

// ── Orchestrator ───────────────────────────────────────────────────────

struct StepFailure {
    step: DeployStep,
    reason: String,
    /// Pointer to restore, when the swap may have happened.
    restore: Option<ImplementationRef>,
}

pub struct DeploymentOrchestrator {
    registry: Arc<ProposalRegistry>,
    ledger: Arc<dyn LedgerClient>,
    migrations: Arc<dyn MigrationRunner>,
    rollbacks: Arc<RollbackManager>,
    locks: Arc<ComponentLocks>,
    clock: Arc<dyn Clock>,
    config: DeploymentConfig,
}

impl DeploymentOrchestrator {
    pub fn new(
        registry: Arc<ProposalRegistry>,
        ledger: Arc<dyn LedgerClient>,
        migrations: Arc<dyn MigrationRunner>,
        rollbacks: Arc<RollbackManager>,
        locks: Arc<ComponentLocks>,
        clock: Arc<dyn Clock>,
        config: DeploymentConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            migrations,
            rollbacks,
            locks,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Deploy a staged proposal.
    #[instrument(skip(self), fields(proposal = %proposal_id))]
    pub async fn deploy(&self, proposal_id: &ProposalId, actor: &str) -> Result<DeploymentRecord> {
        let proposal = self.registry.get(proposal_id).await?;
        ensure_deployable(&proposal)?;

        let guard = self.locks.acquire(&proposal.target_component).await?;
        let started_at = self.clock.now();

        // Re-read under the lock; a racing deploy may have moved it on.
        let proposal = self.registry.get(proposal_id).await?;
        ensure_deployable(&proposal)?;
        self.registry
            .transition(
                proposal_id,
                ProposalStatus::Staged,
                ProposalStatus::Deploying,
                actor,
                &format!("deploying to {}", self.config.environment),
            )
            .await?;

        let failure = match self.execute(&proposal, started_at).await {
            Ok(record) => {
                let detail = format!(
                    "{} now {}",
                    record.target_component, record.new_implementation_ref
                );
                let stored = record.clone();
                match self
                    .registry
                    .transition_with(
                        proposal_id,
                        ProposalStatus::Deploying,
                        ProposalStatus::Deployed,
                        actor,
                        &detail,
                        move |p| p.deployment_record = Some(stored),
                    )
                    .await
                {
                    Ok(_) => {
                        info!(
                            component = %record.target_component,
                            new_ref = %record.new_implementation_ref,
                            duration_ms = record.duration_ms(),
                            "deployment confirmed"
                        );
                        drop(guard);
                        return Ok(record);
                    }
                    // The swap stands unrecorded; undo it while the lock is held.
                    Err(e) => StepFailure {
                        step: DeployStep::Record,
                        reason: e.to_string(),
                        restore: Some(record.previous_implementation_ref),
                    },
                }
            }
            Err(failure) => failure,
        };

        let outcome = self.recover(&guard, &proposal, failure, actor).await;
        drop(guard);
        Err(outcome)
    }

    /// Mark a proposal left in `Deploying` by an interrupted deployment as
    /// `Failed`.
    ///
    /// Deployments hold the component lock for as long as the proposal is
    /// `Deploying`, so one still in that status once the lock is ours was
    /// abandoned.
    #[instrument(skip(self), fields(proposal = %proposal_id))]
    pub async fn reconcile(&self, proposal_id: &ProposalId, actor: &str) -> Result<Proposal> {
        let proposal = self.registry.get(proposal_id).await?;
        ensure_deploying(&proposal)?;

        let guard = self.locks.acquire(&proposal.target_component).await?;
        let proposal = self.registry.get(proposal_id).await?;
        ensure_deploying(&proposal)?;

        let live = match self
            .bounded(DeployStep::ReadCurrent, self.ledger.current_ref(guard.component()))
            .await
        {
            Ok(live) => live.to_string(),
            Err(reason) => format!("unknown ({reason})"),
        };
        let reconciled = self
            .registry
            .transition(
                proposal_id,
                ProposalStatus::Deploying,
                ProposalStatus::Failed,
                actor,
                &format!(
                    "interrupted deployment reconciled; {} live at {live}",
                    proposal.target_component
                ),
            )
            .await?;
        warn!(component = %proposal.target_component, %live, "interrupted deployment reconciled");
        drop(guard);
        Ok(reconciled)
    }

    async fn execute(
        &self,
        proposal: &Proposal,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> std::result::Result<DeploymentRecord, StepFailure> {
        let component = &proposal.target_component;

        let previous = self
            .bounded(DeployStep::ReadCurrent, self.ledger.current_ref(component))
            .await
            .map_err(|reason| StepFailure {
                step: DeployStep::ReadCurrent,
                reason,
                restore: None,
            })?;

        let new_ref = match self
            .bounded(
                DeployStep::Publish,
                self.ledger.publish(component, &proposal.implementation_payload),
            )
            .await
        {
            Ok(r) => r,
            Err(reason) => {
                // A publish that errored or timed out may still have swapped.
                let swapped = !matches!(
                    self.bounded(DeployStep::ReadCurrent, self.ledger.current_ref(component)).await,
                    Ok(ref live) if *live == previous
                );
                return Err(StepFailure {
                    step: DeployStep::Publish,
                    reason,
                    restore: swapped.then(|| previous.clone()),
                });
            }
        };
        let deployed_at = self.clock.now();

        let swapped_failure = |step: DeployStep, reason: String| StepFailure {
            step,
            reason,
            restore: Some(previous.clone()),
        };

        let migration_summary = if proposal.migration_required() {
            let ctx = MigrationContext {
                proposal_id: proposal.id,
                component: component.clone(),
                from_version: proposal.current_version.clone(),
                to_version: proposal.target_version.clone(),
                previous_ref: previous.clone(),
                new_ref: new_ref.clone(),
            };
            let summary = self
                .bounded(DeployStep::Migrate, self.migrations.migrate(&ctx))
                .await
                .map_err(|reason| swapped_failure(DeployStep::Migrate, reason))?;
            Some(summary)
        } else {
            None
        };

        let confirmed = self
            .bounded(DeployStep::Verify, self.ledger.confirm(&new_ref))
            .await
            .map_err(|reason| swapped_failure(DeployStep::Verify, reason))?;
        let live = self
            .bounded(DeployStep::Verify, self.ledger.current_ref(component))
            .await
            .map_err(|reason| swapped_failure(DeployStep::Verify, reason))?;
        if !confirmed || live != new_ref {
            return Err(swapped_failure(
                DeployStep::Verify,
                format!("confirmed={confirmed}, live={live}, expected={new_ref}"),
            ));
        }

        Ok(DeploymentRecord {
            proposal_id: proposal.id,
            target_component: component.clone(),
            environment: self.config.environment.clone(),
            previous_implementation_ref: previous,
            new_implementation_ref: new_ref.clone(),
            started_at,
            deployed_at,
            confirmed_at: self.clock.now(),
            migration_summary,
            verification_result: VerificationResult {
                confirmed,
                live_ref: live,
                detail: format!("{new_ref} confirmed and live"),
            },
        })
    }

    /// Roll back if needed, mark the proposal failed and build the error.
    async fn recover(
        &self,
        guard: &ComponentGuard,
        proposal: &Proposal,
        failure: StepFailure,
        actor: &str,
    ) -> DeployError {
        warn!(step = %failure.step, reason = %failure.reason, "deployment step failed");

        let rollback = match &failure.restore {
            Some(previous) => Some(
                self.rollbacks
                    .restore_locked(
                        guard,
                        Some(proposal.id),
                        previous,
                        DEPLOYMENT_FAILED_REASON,
                        RollbackTrigger::Automatic,
                        actor,
                    )
                    .await,
            ),
            None => None,
        };

        let detail = match &rollback {
            Some(Ok(r)) => format!(
                "{} failed: {}; restored {}",
                failure.step, failure.reason, r.restored_implementation_ref
            ),
            Some(Err(e)) => format!("{} failed: {}; {e}", failure.step, failure.reason),
            None => format!("{} failed: {}", failure.step, failure.reason),
        };

        let marked = self
            .registry
            .transition(
                &proposal.id,
                ProposalStatus::Deploying,
                ProposalStatus::Failed,
                actor,
                &detail,
            )
            .await;

        match (rollback, marked) {
            (Some(Err(rollback_err @ DeployError::RollbackFailed { .. })), marked) => {
                if let Err(e) = marked {
                    error!(error = %e, "could not mark proposal failed after rollback failure");
                }
                rollback_err
            }
            (_, Err(e)) => {
                error!(error = %e, %detail, "deployment outcome not recorded");
                DeployError::Stranded {
                    id: proposal.id,
                    status: ProposalStatus::Deploying,
                    reason: format!("{detail}; could not mark failed: {e}"),
                }
            }
            // Restored but the rollback log write failed.
            (Some(Err(e)), Ok(_)) => e,
            (rollback, Ok(_)) => DeployError::DeploymentFailed {
                id: proposal.id,
                step: failure.step,
                reason: failure.reason,
                rolled_back: rollback.is_some(),
            },
        }
    }

    async fn bounded<T, E: std::fmt::Display>(
        &self,
        step: DeployStep,
        fut: impl Future<Output = std::result::Result<T, E>>,
    ) -> std::result::Result<T, String> {
        match tokio::time::timeout(self.config.step_timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("{step} timed out after {}ms", self.config.step_timeout_ms)),
        }
    }
}

fn ensure_deployable(proposal: &Proposal) -> Result<()> {
    if proposal.status != ProposalStatus::Staged {
        return Err(DeployError::InvalidState {
            id: proposal.id,
            status: proposal.status,
            reason: "deployment requires a staged proposal".into(),
        });
    }
    if !proposal.tests_passed() {
        return Err(DeployError::InvalidState {
            id: proposal.id,
            status: proposal.status,
            reason: "required test results have not all passed".into(),
        });
    }
    Ok(())
}

fn ensure_deploying(proposal: &Proposal) -> Result<()> {
    if proposal.status != ProposalStatus::Deploying {
        return Err(DeployError::InvalidState {
            id: proposal.id,
            status: proposal.status,
            reason: "only an interrupted deployment can be reconciled".into(),
        });
    }
    Ok(())
}
