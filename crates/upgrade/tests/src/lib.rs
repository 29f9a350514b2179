//! Shared fixtures for the cross-crate upgrade governance tests.
//!
//! A [`World`] is a fully wired [`UpgradeGovernor`] over in-memory
//! collaborators, with handles on each simulation so tests can inject
//! faults and inspect side effects.

use std::sync::Arc;

use upgrade_compat::{CompatibilityAnalyzer, StaticCompatibilityAnalyzer};
use upgrade_deploy::{InMemoryLedger, LockMode, SimulatedMigrationRunner};
use upgrade_governor::{
    GovernorConfig, RecordingNotificationSink, Result, UpgradeGovernor, VoteReceipt,
};
use upgrade_pipeline::SimulatedStageExecutor;
use upgrade_store::InMemoryStore;
use upgrade_types::{
    Clock, ComponentId, ManualClock, NewProposal, Proposal, ProposalId, SystemClock, VoteDecision,
    VoterId, VoterRole,
};
use upgrade_voting::IdentityService;

pub const COMPONENT: &str = "student-registry";
pub const GENESIS_REF: &str = "student-registry@genesis";

pub const ADMIN: &str = "admin";
pub const TECHNICAL_COMMITTEE: &str = "technical-committee";
pub const INSTITUTION: &str = "institutional-representative";
pub const AUDITOR: &str = "auditor";
pub const STUDENT: &str = "student-representative";

pub fn component() -> ComponentId {
    ComponentId::new(COMPONENT)
}

// ── Builder ────────────────────────────────────────────────────────────

pub struct WorldBuilder {
    config: GovernorConfig,
    analyzer: Arc<dyn CompatibilityAnalyzer>,
    executor: SimulatedStageExecutor,
    migrations: SimulatedMigrationRunner,
    identity: Option<Arc<dyn IdentityService>>,
    real_time: bool,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        let mut config = GovernorConfig::default();
        config.governor.auto_run_pipeline = false;
        Self {
            config,
            analyzer: Arc::new(StaticCompatibilityAnalyzer::compatible()),
            executor: SimulatedStageExecutor::all_pass(),
            migrations: SimulatedMigrationRunner::new(128),
            identity: None,
            real_time: false,
        }
    }
}

impl WorldBuilder {
    pub fn config(mut self, f: impl FnOnce(&mut GovernorConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn auto_run_pipeline(self) -> Self {
        self.config(|c| c.governor.auto_run_pipeline = true)
    }

    pub fn lock_mode(self, mode: LockMode) -> Self {
        self.config(|c| c.deployment.lock_mode = mode)
    }

    pub fn analyzer(mut self, analyzer: impl CompatibilityAnalyzer + 'static) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn executor(mut self, executor: SimulatedStageExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn migrations(mut self, migrations: SimulatedMigrationRunner) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn identity(mut self, identity: impl IdentityService + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    /// Drive the governor from the system clock. `World::clock` is then
    /// not consulted.
    pub fn real_time(mut self) -> Self {
        self.real_time = true;
        self
    }

    pub fn build(self) -> Result<World> {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let ledger = Arc::new(InMemoryLedger::new().with_component(COMPONENT, GENESIS_REF));
        let executor = Arc::new(self.executor);
        let migrations = Arc::new(self.migrations);
        let notifications = Arc::new(RecordingNotificationSink::new());

        let governor_clock: Arc<dyn Clock> = if self.real_time {
            Arc::new(SystemClock)
        } else {
            clock.clone()
        };

        let mut builder = UpgradeGovernor::builder(self.config)
            .store(store.clone())
            .clock(governor_clock)
            .analyzer(self.analyzer)
            .stage_executor(executor.clone())
            .ledger(ledger.clone())
            .migration_runner(migrations.clone())
            .notifier(notifications.clone());
        if let Some(identity) = self.identity {
            builder = builder.identity(identity);
        }

        Ok(World {
            governor: builder.build()?,
            store,
            clock,
            ledger,
            executor,
            migrations,
            notifications,
        })
    }
}

// ── World ──────────────────────────────────────────────────────────────

pub struct World {
    pub governor: UpgradeGovernor,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
    pub executor: Arc<SimulatedStageExecutor>,
    pub migrations: Arc<SimulatedMigrationRunner>,
    pub notifications: Arc<RecordingNotificationSink>,
}

impl World {
    pub fn builder() -> WorldBuilder {
        WorldBuilder::default()
    }

    pub fn new_proposal(&self, current: &str, target: &str) -> NewProposal {
        NewProposal::new(
            component(),
            current,
            target,
            format!("{COMPONENT} {target}").into_bytes(),
            VoterId::new("proposer"),
            self.governor.default_deadline(),
        )
        .with_description(format!("upgrade {COMPONENT} to {target}"))
    }

    /// Create a proposal and open voting.
    pub async fn propose(&self, current: &str, target: &str) -> Result<Proposal> {
        self.governor.propose(self.new_proposal(current, target)).await
    }

    pub async fn vote(
        &self,
        id: &ProposalId,
        voter: &str,
        role: &str,
        decision: VoteDecision,
    ) -> Result<VoteReceipt> {
        self.governor
            .cast_vote(
                id,
                &VoterId::new(voter),
                &VoterRole::new(role),
                decision,
                "reviewed",
            )
            .await
    }

    /// Admin and auditor approve: exactly quorum, unanimous.
    pub async fn approve(&self, id: &ProposalId) -> Result<VoteReceipt> {
        self.vote(id, "root", ADMIN, VoteDecision::Approve).await?;
        self.vote(id, "ledger-auditor", AUDITOR, VoteDecision::Approve).await
    }

    /// Propose, approve and run the pipeline.
    pub async fn stage(&self, current: &str, target: &str) -> Result<Proposal> {
        let proposal = self.propose(current, target).await?;
        self.approve(&proposal.id).await?;
        self.governor.run_pipeline(&proposal.id).await?;
        self.governor.get(&proposal.id).await
    }
}
