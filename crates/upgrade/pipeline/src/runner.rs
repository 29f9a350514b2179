//! Gated test pipeline.
//!
//! ```text
//! [compilation] → [sandbox] → [migration] → [backward compat] → [perf ∥ security]
//! ```
//!
//! Groups run in order. Stages inside a group run concurrently and are
//! joined before the gate: the first group containing a failing required
//! stage ends the run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use upgrade_types::{Clock, StageResult, StageStatus, TestStage};

use crate::cancel::CancellationSignal;
use crate::executor::{StageContext, StageExecutor};

/// Execution plan: groups in order, stages within a group concurrent.
pub const EXECUTION_PLAN: [&[TestStage]; 5] = [
    &[TestStage::Compilation],
    &[TestStage::SandboxDeployment],
    &[TestStage::MigrationTest],
    &[TestStage::BackwardCompatibility],
    &[TestStage::PerformanceBenchmark, TestStage::SecurityAudit],
];

// ── Configuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on a single stage.
    pub stage_timeout_ms: u64,
    /// Stages that are run and recorded but never gate the pipeline.
    pub advisory_stages: BTreeSet<TestStage>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: 300_000,
            advisory_stages: BTreeSet::new(),
        }
    }
}

impl PipelineConfig {
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_advisory(mut self, stage: TestStage) -> Self {
        self.advisory_stages.insert(stage);
        self
    }

    pub fn is_required(&self, stage: TestStage) -> bool {
        !self.advisory_stages.contains(&stage)
    }
}

// ── Report ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PipelineVerdict {
    Passed,
    Failed { stage: TestStage, error: String },
    Cancelled,
}

/// Everything recorded during one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub results: Vec<StageResult>,
    pub verdict: PipelineVerdict,
}

impl PipelineReport {
    pub fn passed(&self) -> bool {
        self.verdict == PipelineVerdict::Passed
    }

    pub fn result_for(&self, stage: TestStage) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.results.iter().map(|r| r.duration_ms).sum()
    }
}

impl std::fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let passed = self
            .results
            .iter()
            .filter(|r| r.status == StageStatus::Passed)
            .count();
        match &self.verdict {
            PipelineVerdict::Passed => write!(f, "passed ({passed}/{} stages)", self.results.len()),
            PipelineVerdict::Failed { stage, error } => write!(f, "failed at {stage}: {error}"),
            PipelineVerdict::Cancelled => write!(f, "cancelled after {passed} passed stages"),
        }
    }
}

// ── Runner ─────────────────────────────────────────────────────────────

pub struct TestPipelineRunner {
    executor: Arc<dyn StageExecutor>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl TestPipelineRunner {
    pub fn new(executor: Arc<dyn StageExecutor>, clock: Arc<dyn Clock>, config: PipelineConfig) -> Self {
        Self {
            executor,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole plan for one proposal.
    #[instrument(skip(self, ctx, cancel), fields(proposal = %ctx.proposal_id))]
    pub async fn run(&self, ctx: &StageContext, cancel: &CancellationSignal) -> PipelineReport {
        let mut results = Vec::with_capacity(TestStage::ALL.len());

        for group in EXECUTION_PLAN {
            if cancel.is_cancelled() {
                info!("pipeline cancelled between groups");
                return PipelineReport {
                    results,
                    verdict: PipelineVerdict::Cancelled,
                };
            }

            let mut runnable = Vec::with_capacity(group.len());
            for stage in group {
                if *stage == TestStage::MigrationTest && !ctx.migration_required {
                    results.push(
                        StageResult::skipped(*stage, self.clock.now())
                            .with_required(self.config.is_required(*stage)),
                    );
                } else {
                    runnable.push(*stage);
                }
            }
            if runnable.is_empty() {
                continue;
            }

            let group_results = futures::future::join_all(
                runnable.iter().map(|stage| self.run_stage(*stage, ctx, cancel)),
            )
            .await;

            let cancelled = group_results
                .iter()
                .any(|r| r.status == StageStatus::Cancelled);
            let failure = group_results
                .iter()
                .find(|r| r.blocks_pipeline())
                .map(|r| (r.stage, r.error.clone().unwrap_or_default()));
            results.extend(group_results);

            if cancelled {
                return PipelineReport {
                    results,
                    verdict: PipelineVerdict::Cancelled,
                };
            }
            if let Some((stage, error)) = failure {
                warn!(%stage, %error, "pipeline halted");
                return PipelineReport {
                    results,
                    verdict: PipelineVerdict::Failed { stage, error },
                };
            }
        }

        info!(stages = results.len(), "pipeline passed");
        PipelineReport {
            results,
            verdict: PipelineVerdict::Passed,
        }
    }

    async fn run_stage(
        &self,
        stage: TestStage,
        ctx: &StageContext,
        cancel: &CancellationSignal,
    ) -> StageResult {
        let started_at = self.clock.now();
        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.stage_timeout_ms);

        let (status, metrics, error) = tokio::select! {
            biased;
            _ = cancel.cancelled() => (
                StageStatus::Cancelled,
                BTreeMap::new(),
                Some("pipeline cancelled".to_string()),
            ),
            res = tokio::time::timeout(timeout, self.executor.run(stage, ctx)) => match res {
                Ok(outcome) if outcome.success => (StageStatus::Passed, outcome.metrics, None),
                Ok(outcome) => (
                    StageStatus::Failed,
                    outcome.metrics,
                    Some(outcome.error.unwrap_or_else(|| "stage failed".to_string())),
                ),
                Err(_) => (
                    StageStatus::TimedOut,
                    BTreeMap::new(),
                    Some(format!("timed out after {}ms", self.config.stage_timeout_ms)),
                ),
            },
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match status {
            StageStatus::Passed => info!(%stage, duration_ms, "stage passed"),
            _ => warn!(%stage, ?status, duration_ms, error = error.as_deref().unwrap_or(""), "stage did not pass"),
        }

        StageResult::finished(stage, status, metrics, error, started_at, duration_ms)
            .with_required(self.config.is_required(stage))
    }
}
