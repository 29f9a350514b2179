//! Simulated campus deployment: a student registry component, its voters
//! and in-memory collaborators.

use std::sync::Arc;

use upgrade_compat::SemverCompatibilityAnalyzer;
use upgrade_deploy::{InMemoryLedger, SimulatedMigrationRunner};
use upgrade_governor::{GovernorConfig, UpgradeGovernor, VoteReceipt};
use upgrade_pipeline::SimulatedStageExecutor;
use upgrade_types::{
    ComponentId, ManualClock, NewProposal, Proposal, ProposalId, StageOutcome, TestStage,
    VoteDecision, VoterId, VoterRole,
};

pub const COMPONENT: &str = "student-registry";
pub const GENESIS_REF: &str = "student-registry@genesis";

/// Named voters and the roles they hold.
pub const ADMIN: (&str, &str) = ("dean-okafor", "admin");
pub const AUDITOR: (&str, &str) = ("audit-office", "auditor");
pub const STUDENT: (&str, &str) = ("student-union", "student-representative");

pub struct Campus {
    pub governor: UpgradeGovernor,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
}

impl Campus {
    pub fn new(config: GovernorConfig, migrations: SimulatedMigrationRunner) -> anyhow::Result<Self> {
        let clock = Arc::new(ManualClock::starting_now());
        let ledger = Arc::new(InMemoryLedger::new().with_component(COMPONENT, GENESIS_REF));
        let executor = SimulatedStageExecutor::all_pass()
            .with_outcome(
                TestStage::PerformanceBenchmark,
                StageOutcome::passed()
                    .with_metric("p99_ms", 41.0)
                    .with_metric("throughput_rps", 1250.0),
            )
            .with_outcome(
                TestStage::SecurityAudit,
                StageOutcome::passed().with_metric("findings", 0.0),
            );

        let governor = UpgradeGovernor::builder(config)
            .clock(clock.clone())
            .analyzer(Arc::new(SemverCompatibilityAnalyzer::new()))
            .stage_executor(Arc::new(executor))
            .ledger(ledger.clone())
            .migration_runner(Arc::new(migrations))
            .build()?;

        Ok(Self {
            governor,
            clock,
            ledger,
        })
    }

    pub fn component(&self) -> ComponentId {
        ComponentId::new(COMPONENT)
    }

    pub async fn propose(&self, current: &str, target: &str, description: &str) -> anyhow::Result<Proposal> {
        let new = NewProposal::new(
            self.component(),
            current,
            target,
            format!("{COMPONENT} build {target}").into_bytes(),
            VoterId::new("registrar"),
            self.governor.default_deadline(),
        )
        .with_description(description);
        Ok(self.governor.propose(new).await?)
    }

    pub async fn vote(
        &self,
        id: &ProposalId,
        (voter, role): (&str, &str),
        decision: VoteDecision,
        justification: &str,
    ) -> anyhow::Result<VoteReceipt> {
        Ok(self
            .governor
            .cast_vote(
                id,
                &VoterId::new(voter),
                &VoterRole::new(role),
                decision,
                justification,
            )
            .await?)
    }
}
