//! Stage executor capability and its simulated implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use upgrade_types::{ComponentId, Proposal, ProposalId, StageOutcome, TestStage};

/// What a stage needs to know about the proposal under test.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub proposal_id: ProposalId,
    pub target_component: ComponentId,
    pub current_version: String,
    pub target_version: String,
    pub payload: Arc<Vec<u8>>,
    pub migration_required: bool,
}

impl StageContext {
    pub fn from_proposal(proposal: &Proposal) -> Self {
        Self {
            proposal_id: proposal.id,
            target_component: proposal.target_component.clone(),
            current_version: proposal.current_version.clone(),
            target_version: proposal.target_version.clone(),
            payload: Arc::new(proposal.implementation_payload.clone()),
            migration_required: proposal.migration_required(),
        }
    }
}

/// Runs one pipeline stage against a payload.
///
/// Failures are reported in the [`StageOutcome`], not as errors.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn run(&self, stage: TestStage, ctx: &StageContext) -> StageOutcome;
}

/// Simulated executor with scripted per-stage outcomes and delays.
///
/// Stages without a scripted outcome pass.
#[derive(Default)]
pub struct SimulatedStageExecutor {
    outcomes: HashMap<TestStage, StageOutcome>,
    delays: HashMap<TestStage, Duration>,
    invocations: Mutex<Vec<TestStage>>,
}

impl SimulatedStageExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stage passes.
    pub fn all_pass() -> Self {
        Self::new()
    }

    pub fn with_outcome(mut self, stage: TestStage, outcome: StageOutcome) -> Self {
        self.outcomes.insert(stage, outcome);
        self
    }

    pub fn with_failure(self, stage: TestStage, error: impl Into<String>) -> Self {
        self.with_outcome(stage, StageOutcome::failed(error))
    }

    pub fn with_delay(mut self, stage: TestStage, delay: Duration) -> Self {
        self.delays.insert(stage, delay);
        self
    }

    /// Stages started so far, in start order.
    pub fn invocations(&self) -> Vec<TestStage> {
        self.invocations.lock().clone()
    }

    pub fn was_invoked(&self, stage: TestStage) -> bool {
        self.invocations.lock().contains(&stage)
    }
}

#[async_trait]
impl StageExecutor for SimulatedStageExecutor {
    async fn run(&self, stage: TestStage, ctx: &StageContext) -> StageOutcome {
        self.invocations.lock().push(stage);
        if let Some(delay) = self.delays.get(&stage) {
            tokio::time::sleep(*delay).await;
        }
        match self.outcomes.get(&stage) {
            Some(outcome) => outcome.clone(),
            None => StageOutcome::passed().with_metric("payload_bytes", ctx.payload.len() as f64),
        }
    }
}
