//! The upgrade governor facade.
//!
//! Drives a proposal through its whole life:
//!
//! ```text
//! propose ─► analyze ─► VOTING ─► tally ─► APPROVED ─► TESTING ─► pipeline
//!                                   │                              │
//!                                   └► REJECTED        FAILED ◄────┤
//!                                                                  ▼
//!             ROLLED_BACK ◄─ rollback ◄─ DEPLOYED ◄─ deploy ◄─ STAGED
//! ```
//!
//! Components never call each other; the governor is the only place where
//! one component's output becomes another's input.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use upgrade_compat::{CompatibilityAnalyzer, SemverCompatibilityAnalyzer};
use upgrade_deploy::{
    ComponentLocks, DeployError, DeploymentOrchestrator, InMemoryLedger, LedgerClient,
    MigrationRunner, RollbackManager, SimulatedMigrationRunner,
};
use upgrade_pipeline::{
    CancellationSignal, PipelineReport, PipelineVerdict, SimulatedStageExecutor, StageContext,
    StageExecutor, TestPipelineRunner,
};
use upgrade_registry::{AuditTrail, ChainVerification, ProposalRegistry, RegistryError};
use upgrade_store::{AuditStore, InMemoryStore, ProposalStore, RollbackStore, UpgradeStore, VoteStore};
use upgrade_types::{
    AuditEntry, Clock, CompatibilityReport, ComponentId, DeploymentRecord, ImplementationRef,
    NewProposal, Proposal, ProposalId, ProposalStatus, RollbackRecord, SystemClock, Tally,
    TallyOutcome, Vote, VoteDecision, VoterId, VoterRole,
};
use upgrade_voting::{IdentityService, VotingEngine};

use crate::config::GovernorConfig;
use crate::error::{GovernorError, Result};
use crate::notify::{dispatch, Notification, NotificationSink, TracingNotificationSink};
use crate::summary::GovernorSummary;

/// Detail recorded when a voting window closes without a decision.
pub const NO_QUORUM_DETAIL: &str = "voting window closed without quorum";

/// What a caller gets back from [`UpgradeGovernor::cast_vote`].
#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub vote: Vote,
    pub tally: Tally,
    /// Proposal status after the tally was applied.
    pub status: ProposalStatus,
}

// ── Builder ────────────────────────────────────────────────────────────

struct Stores {
    proposals: Arc<dyn ProposalStore>,
    votes: Arc<dyn VoteStore>,
    audit: Arc<dyn AuditStore>,
    rollbacks: Arc<dyn RollbackStore>,
}

impl Stores {
    fn from_backend<S: UpgradeStore + 'static>(store: Arc<S>) -> Self {
        Self {
            proposals: store.clone(),
            votes: store.clone(),
            audit: store.clone(),
            rollbacks: store,
        }
    }
}

/// Assembles an [`UpgradeGovernor`]. Every collaborator has an in-process
/// default.
pub struct UpgradeGovernorBuilder {
    config: GovernorConfig,
    stores: Option<Stores>,
    clock: Option<Arc<dyn Clock>>,
    analyzer: Option<Arc<dyn CompatibilityAnalyzer>>,
    executor: Option<Arc<dyn StageExecutor>>,
    ledger: Option<Arc<dyn LedgerClient>>,
    migrations: Option<Arc<dyn MigrationRunner>>,
    identity: Option<Arc<dyn IdentityService>>,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl UpgradeGovernorBuilder {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            stores: None,
            clock: None,
            analyzer: None,
            executor: None,
            ledger: None,
            migrations: None,
            identity: None,
            notifier: None,
        }
    }

    pub fn store<S: UpgradeStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.stores = Some(Stores::from_backend(store));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn CompatibilityAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn stage_executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn migration_runner(mut self, migrations: Arc<dyn MigrationRunner>) -> Self {
        self.migrations = Some(migrations);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityService>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<UpgradeGovernor> {
        self.config.validate()?;
        let config = self.config;

        let stores = self
            .stores
            .unwrap_or_else(|| Stores::from_backend(Arc::new(InMemoryStore::new())));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(InMemoryLedger::new()));
        let migrations = self
            .migrations
            .unwrap_or_else(|| Arc::new(SimulatedMigrationRunner::new(0)));

        let registry = Arc::new(ProposalRegistry::new(
            stores.proposals.clone(),
            clock.clone(),
            config.voting.roles(),
        ));
        let audit = AuditTrail::new(stores.audit);

        let mut voting = VotingEngine::new(
            stores.proposals,
            stores.votes,
            clock.clone(),
            config.voting.clone(),
        );
        if let Some(identity) = self.identity {
            voting = voting.with_identity(identity);
        }

        let pipeline = TestPipelineRunner::new(
            self.executor
                .unwrap_or_else(|| Arc::new(SimulatedStageExecutor::all_pass())),
            clock.clone(),
            config.pipeline.clone(),
        );

        let locks = Arc::new(ComponentLocks::new(config.deployment.lock_mode));
        let rollbacks = Arc::new(RollbackManager::new(
            registry.clone(),
            ledger.clone(),
            stores.rollbacks,
            locks.clone(),
            clock.clone(),
            config.deployment.step_timeout(),
        ));
        let orchestrator = DeploymentOrchestrator::new(
            registry.clone(),
            ledger,
            migrations,
            rollbacks.clone(),
            locks,
            clock.clone(),
            config.deployment.clone(),
        );

        Ok(UpgradeGovernor {
            inner: Arc::new(Inner {
                config,
                clock,
                registry,
                audit,
                analyzer: self
                    .analyzer
                    .unwrap_or_else(|| Arc::new(SemverCompatibilityAnalyzer::new())),
                voting,
                pipeline,
                orchestrator,
                rollbacks,
                notifier: self
                    .notifier
                    .unwrap_or_else(|| Arc::new(TracingNotificationSink)),
                active: DashMap::new(),
                background: DashMap::new(),
            }),
        })
    }
}

// ── Governor ───────────────────────────────────────────────────────────

struct Inner {
    config: GovernorConfig,
    clock: Arc<dyn Clock>,
    registry: Arc<ProposalRegistry>,
    audit: AuditTrail,
    analyzer: Arc<dyn CompatibilityAnalyzer>,
    voting: VotingEngine,
    pipeline: TestPipelineRunner,
    orchestrator: DeploymentOrchestrator,
    rollbacks: Arc<RollbackManager>,
    notifier: Arc<dyn NotificationSink>,
    /// Cancellation handles of running pipelines.
    active: DashMap<ProposalId, CancellationSignal>,
    /// Pipelines spawned after approval that have not finished; each task
    /// removes its own entry once its outcome is recorded.
    background: DashMap<ProposalId, JoinHandle<Result<PipelineReport>>>,
}

/// Removes the active-pipeline entry however the run ends.
struct ActiveRun<'a> {
    active: &'a DashMap<ProposalId, CancellationSignal>,
    id: ProposalId,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct UpgradeGovernor {
    inner: Arc<Inner>,
}

impl UpgradeGovernor {
    pub fn builder(config: GovernorConfig) -> UpgradeGovernorBuilder {
        UpgradeGovernorBuilder::new(config)
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// `now + default_voting_period_secs`.
    pub fn default_deadline(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.inner.config.voting.default_voting_period_secs).unwrap_or(i64::MAX);
        let period = chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX);
        let now = self.inner.clock.now();
        now.checked_add_signed(period).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // ── Proposals ──────────────────────────────────────────────────────

    /// Create a proposal, attach its compatibility report and open voting.
    #[instrument(skip(self, new), fields(component = %new.target_component))]
    pub async fn propose(&self, new: NewProposal) -> Result<Proposal> {
        let actor = new.proposer_id.as_str().to_string();
        let created = self.inner.registry.create(new, &actor).await?;

        let report = match self.inner.analyzer.analyze(&created).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    proposal = %created.id,
                    analyzer = self.inner.analyzer.name(),
                    error = %e,
                    "compatibility analysis failed, assuming migration required"
                );
                CompatibilityReport::unknown().with_note(e.to_string())
            }
        };

        let detail = format!("voting opened, risk {}", report.risk_level);
        let opened = self
            .inner
            .registry
            .transition_with(
                &created.id,
                ProposalStatus::Proposed,
                ProposalStatus::Voting,
                &actor,
                &detail,
                move |p| p.compatibility_report = Some(report),
            )
            .await?;

        self.notify(Notification::VotingOpened {
            proposal_id: opened.id,
            component: opened.target_component.clone(),
            target_version: opened.target_version.clone(),
            eligible_roles: opened.eligible_roles.iter().cloned().collect(),
            voting_deadline: opened.voting_deadline,
        });
        Ok(opened)
    }

    pub async fn get(&self, id: &ProposalId) -> Result<Proposal> {
        Ok(self.inner.registry.get(id).await?)
    }

    pub async fn list_by_status(&self, status: ProposalStatus) -> Result<Vec<Proposal>> {
        Ok(self.inner.registry.list_by_status(status).await?)
    }

    /// Cancel a proposal in `Voting` or `Testing`, aborting its pipeline.
    #[instrument(skip(self, reason), fields(proposal = %id))]
    pub async fn cancel(&self, id: &ProposalId, actor: &str, reason: &str) -> Result<Proposal> {
        let current = self.inner.registry.get(id).await?;
        if !current.status.is_cancellable() {
            return Err(GovernorError::InvalidState {
                id: *id,
                status: current.status,
                action: "cancel".into(),
            });
        }
        let cancelled = self
            .inner
            .registry
            .transition(id, current.status, ProposalStatus::Cancelled, actor, reason)
            .await?;

        let signal = self.inner.active.get(id).map(|s| s.value().clone());
        if let Some(signal) = signal {
            signal.cancel();
            info!("running pipeline signalled to stop");
        }

        self.notify(Notification::Decided {
            proposal_id: *id,
            status: ProposalStatus::Cancelled,
            detail: reason.to_string(),
        });
        Ok(cancelled)
    }

    // ── Voting ─────────────────────────────────────────────────────────

    /// Record a vote and apply the resulting tally.
    ///
    /// An approving tally moves the proposal to `Testing` (and starts the
    /// pipeline in the background when `auto_run_pipeline` is set); a
    /// rejecting tally ends it.
    pub async fn cast_vote(
        &self,
        id: &ProposalId,
        voter: &VoterId,
        role: &VoterRole,
        decision: VoteDecision,
        justification: &str,
    ) -> Result<VoteReceipt> {
        let vote = self
            .inner
            .voting
            .cast_vote(id, voter, role, decision, justification)
            .await?;
        let tally = self.inner.voting.tally(id).await?;
        let status = self.apply_tally(id, &tally, voter.as_str(), false).await?;
        Ok(VoteReceipt { vote, tally, status })
    }

    pub async fn tally(&self, id: &ProposalId) -> Result<Tally> {
        Ok(self.inner.voting.tally(id).await?)
    }

    pub async fn votes(&self, id: &ProposalId) -> Result<Vec<Vote>> {
        Ok(self.inner.voting.votes(id).await?)
    }

    /// Decide every `Voting` proposal whose deadline has passed.
    ///
    /// Tallies still pending at the deadline are rejected.
    #[instrument(skip(self))]
    pub async fn close_expired_voting(&self) -> Result<Vec<(ProposalId, ProposalStatus)>> {
        let now = self.inner.clock.now();
        let mut closed = Vec::new();
        for proposal in self.inner.registry.list_by_status(ProposalStatus::Voting).await? {
            if now <= proposal.voting_deadline {
                continue;
            }
            let tally = self.inner.voting.tally(&proposal.id).await?;
            let status = self.apply_tally(&proposal.id, &tally, "governor", true).await?;
            closed.push((proposal.id, status));
        }
        if !closed.is_empty() {
            info!(closed = closed.len(), "expired voting windows closed");
        }
        Ok(closed)
    }

    /// Run [`close_expired_voting`](Self::close_expired_voting) every
    /// `period` until the handle is aborted.
    pub fn spawn_deadline_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let governor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = governor.close_expired_voting().await {
                    warn!(error = %e, "deadline sweep failed");
                }
            }
        })
    }

    async fn apply_tally(
        &self,
        id: &ProposalId,
        tally: &Tally,
        actor: &str,
        closing: bool,
    ) -> Result<ProposalStatus> {
        let (next, detail) = match tally.outcome {
            TallyOutcome::Approved => (ProposalStatus::Approved, format!("approved: {tally}")),
            TallyOutcome::Rejected => (ProposalStatus::Rejected, format!("rejected: {tally}")),
            TallyOutcome::Pending if closing => (ProposalStatus::Rejected, NO_QUORUM_DETAIL.to_string()),
            TallyOutcome::Pending => return Ok(self.inner.registry.get(id).await?.status),
        };

        let reg = &self.inner.registry;
        if let Some(actual) =
            settled(reg.transition(id, ProposalStatus::Voting, next, actor, &detail).await)?
        {
            return Ok(actual);
        }

        if next == ProposalStatus::Rejected {
            self.notify(Notification::Decided {
                proposal_id: *id,
                status: next,
                detail,
            });
            return Ok(next);
        }

        if let Some(actual) = settled(
            reg.transition(
                id,
                ProposalStatus::Approved,
                ProposalStatus::Testing,
                "governor",
                "test pipeline queued",
            )
            .await,
        )? {
            return Ok(actual);
        }
        self.notify(Notification::Decided {
            proposal_id: *id,
            status: ProposalStatus::Approved,
            detail,
        });

        if self.inner.config.governor.auto_run_pipeline {
            self.spawn_pipeline(*id);
        }
        Ok(ProposalStatus::Testing)
    }

    // ── Pipeline ───────────────────────────────────────────────────────

    /// Run the test pipeline for a proposal in `Testing` and record the
    /// outcome: `Staged` on pass, `Failed` on a failing required stage.
    #[instrument(skip(self), fields(proposal = %id))]
    pub async fn run_pipeline(&self, id: &ProposalId) -> Result<PipelineReport> {
        let signal = match self.inner.active.entry(*id) {
            Entry::Occupied(_) => return Err(GovernorError::PipelineBusy(*id)),
            Entry::Vacant(slot) => {
                let signal = CancellationSignal::new();
                slot.insert(signal.clone());
                signal
            }
        };
        let _active = ActiveRun {
            active: &self.inner.active,
            id: *id,
        };

        // Read after registering so a concurrent cancel is never missed.
        let proposal = self.inner.registry.get(id).await?;
        if proposal.status != ProposalStatus::Testing {
            return Err(GovernorError::InvalidState {
                id: *id,
                status: proposal.status,
                action: "run the test pipeline".into(),
            });
        }

        let ctx = StageContext::from_proposal(&proposal);
        let report = self.inner.pipeline.run(&ctx, &signal).await;
        info!(%report, "pipeline finished");
        self.record_report(id, &report).await?;
        Ok(report)
    }

    /// Wait for a pipeline spawned after approval. `None` when none is
    /// running for `id`; a finished run's outcome is on the proposal.
    pub async fn await_pipeline(&self, id: &ProposalId) -> Result<Option<PipelineReport>> {
        let Some((_, handle)) = self.inner.background.remove(id) else {
            return Ok(None);
        };
        match handle.await {
            Ok(result) => result.map(Some),
            Err(e) => Err(GovernorError::TaskAborted {
                id: *id,
                reason: e.to_string(),
            }),
        }
    }

    /// Background pipelines spawned after approval that are still running.
    pub fn running_pipelines(&self) -> usize {
        self.inner.background.len()
    }

    fn spawn_pipeline(&self, id: ProposalId) {
        let governor = self.clone();
        let (registered_tx, registered) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            // Run only once the handle is in the map, so the removal below
            // cannot precede the insert.
            let _ = registered.await;
            let result = governor.run_pipeline(&id).await;
            if let Err(e) = &result {
                warn!(proposal = %id, error = %e, "background pipeline did not complete");
            }
            governor.inner.background.remove(&id);
            result
        });
        self.inner.background.insert(id, handle);
        let _ = registered_tx.send(());
    }

    async fn record_report(&self, id: &ProposalId, report: &PipelineReport) -> Result<()> {
        let reg = &self.inner.registry;
        let results = report.results.clone();

        let (next, detail) = match &report.verdict {
            PipelineVerdict::Passed => (ProposalStatus::Staged, format!("pipeline {report}")),
            PipelineVerdict::Failed { stage, error } => {
                (ProposalStatus::Failed, format!("stage {stage} failed: {error}"))
            }
            PipelineVerdict::Cancelled => {
                self.attach_to_cancelled(id, results).await?;
                return Ok(());
            }
        };

        let outcome = reg
            .transition_with(id, ProposalStatus::Testing, next, "pipeline", &detail, {
                let results = results.clone();
                move |p| p.test_results = Some(results)
            })
            .await;
        match settled(outcome)? {
            None => {
                self.notify(Notification::Decided {
                    proposal_id: *id,
                    status: next,
                    detail,
                });
                Ok(())
            }
            // Cancelled between the last stage and the gate.
            Some(ProposalStatus::Cancelled) => self.attach_to_cancelled(id, results).await,
            Some(actual) => {
                warn!(proposal = %id, status = %actual, "pipeline outcome dropped, proposal moved on");
                Ok(())
            }
        }
    }

    async fn attach_to_cancelled(
        &self,
        id: &ProposalId,
        results: Vec<upgrade_types::StageResult>,
    ) -> Result<()> {
        match self
            .inner
            .registry
            .amend(id, ProposalStatus::Cancelled, move |p| p.test_results = Some(results))
            .await
        {
            Ok(_) => Ok(()),
            Err(RegistryError::Conflict { actual, .. }) => {
                warn!(proposal = %id, status = %actual, "partial results not attached");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Deployment ─────────────────────────────────────────────────────

    /// Deploy a `Staged` proposal.
    pub async fn deploy(&self, id: &ProposalId, actor: &str) -> Result<DeploymentRecord> {
        match self.inner.orchestrator.deploy(id, actor).await {
            Ok(record) => {
                self.notify(Notification::Deployed {
                    proposal_id: *id,
                    component: record.target_component.clone(),
                    implementation_ref: record.new_implementation_ref.clone(),
                });
                Ok(record)
            }
            Err(e) => {
                match &e {
                    DeployError::DeploymentFailed { .. } => self.notify(Notification::Decided {
                        proposal_id: *id,
                        status: ProposalStatus::Failed,
                        detail: e.to_string(),
                    }),
                    DeployError::RollbackFailed { component, reason } => {
                        self.alert_rollback_failed(component, reason)
                    }
                    DeployError::Stranded { id, status, reason } => {
                        self.notify(Notification::DeploymentStranded {
                            proposal_id: *id,
                            status: *status,
                            reason: reason.clone(),
                        })
                    }
                    _ => {}
                }
                Err(e.into())
            }
        }
    }

    /// Mark a proposal stranded in `Deploying` as `Failed`.
    pub async fn reconcile_deployment(&self, id: &ProposalId, actor: &str) -> Result<Proposal> {
        let proposal = self.inner.orchestrator.reconcile(id, actor).await?;
        self.notify(Notification::Decided {
            proposal_id: *id,
            status: proposal.status,
            detail: "interrupted deployment reconciled".into(),
        });
        Ok(proposal)
    }

    /// Roll a `Deployed` proposal back to the implementation it replaced.
    pub async fn rollback(&self, id: &ProposalId, reason: &str, actor: &str) -> Result<RollbackRecord> {
        let result = self.inner.rollbacks.rollback_proposal(id, reason, actor).await;
        self.after_rollback(result)
    }

    /// Point `component` at `restore_ref` outside any proposal.
    pub async fn rollback_component(
        &self,
        component: &ComponentId,
        restore_ref: &ImplementationRef,
        reason: &str,
        actor: &str,
    ) -> Result<RollbackRecord> {
        let result = self
            .inner
            .rollbacks
            .rollback_component(component, restore_ref, reason, actor)
            .await;
        self.after_rollback(result)
    }

    pub async fn rollback_history(&self, component: &ComponentId) -> Result<Vec<RollbackRecord>> {
        Ok(self.inner.rollbacks.history(component).await?)
    }

    fn after_rollback(
        &self,
        result: std::result::Result<RollbackRecord, DeployError>,
    ) -> Result<RollbackRecord> {
        match result {
            Ok(record) => {
                self.notify(Notification::RolledBack {
                    proposal_id: record.proposal_id,
                    component: record.target_component.clone(),
                    restored_ref: record.restored_implementation_ref.clone(),
                    reason: record.reason.clone(),
                });
                Ok(record)
            }
            Err(e) => {
                if let DeployError::RollbackFailed { component, reason } = &e {
                    self.alert_rollback_failed(component, reason);
                }
                Err(e.into())
            }
        }
    }

    fn alert_rollback_failed(&self, component: &ComponentId, reason: &str) {
        self.notify(Notification::RollbackFailed {
            component: component.clone(),
            reason: reason.to_string(),
        });
    }

    // ── Audit ──────────────────────────────────────────────────────────

    /// Audit entries for one proposal, oldest first.
    pub async fn audit_trail(&self, id: &ProposalId) -> Result<Vec<AuditEntry>> {
        Ok(self.inner.audit.query(id).await?)
    }

    pub async fn full_audit_trail(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.inner.audit.all().await?)
    }

    pub async fn verify_audit_chain(&self) -> Result<ChainVerification> {
        Ok(self.inner.audit.verify_chain().await?)
    }

    pub async fn validate_lifecycle(&self, id: &ProposalId) -> Result<()> {
        Ok(self.inner.audit.validate_lifecycle(id).await?)
    }

    pub async fn summary(&self) -> Result<GovernorSummary> {
        let proposals = self.inner.registry.list_all().await?;
        let audit_entries = self.inner.audit.all().await?.len();
        Ok(GovernorSummary::from_proposals(&proposals, audit_entries))
    }

    fn notify(&self, notification: Notification) {
        dispatch(&self.inner.notifier, notification);
    }
}

/// `Ok(None)` when the transition happened, `Ok(Some(actual))` when another
/// caller moved the proposal first.
fn settled(result: upgrade_registry::Result<Proposal>) -> Result<Option<ProposalStatus>> {
    match result {
        Ok(_) => Ok(None),
        Err(RegistryError::Conflict { id, actual, .. }) => {
            warn!(proposal = %id, status = %actual, "lost transition race");
            Ok(Some(actual))
        }
        Err(e) => Err(e.into()),
    }
}
