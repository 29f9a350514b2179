//! Test pipeline stages and their recorded results.
//!
//! Stage failures are data: a failed stage is a [`StageResult`] with a
//! non-passing status, never an error value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stage of the upgrade test pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStage {
    Compilation,
    SandboxDeployment,
    MigrationTest,
    BackwardCompatibility,
    PerformanceBenchmark,
    SecurityAudit,
}

impl TestStage {
    /// All stages in pipeline order.
    pub const ALL: [TestStage; 6] = [
        Self::Compilation,
        Self::SandboxDeployment,
        Self::MigrationTest,
        Self::BackwardCompatibility,
        Self::PerformanceBenchmark,
        Self::SecurityAudit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compilation => "compilation",
            Self::SandboxDeployment => "sandbox_deployment",
            Self::MigrationTest => "migration_test",
            Self::BackwardCompatibility => "backward_compatibility",
            Self::PerformanceBenchmark => "performance_benchmark",
            Self::SecurityAudit => "security_audit",
        }
    }
}

impl std::fmt::Display for TestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage executor reports back for a single stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub success: bool,
    pub metrics: BTreeMap<String, f64>,
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn passed() -> Self {
        Self {
            success: true,
            metrics: BTreeMap::new(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            metrics: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Final status of a stage within one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    /// Not attempted because it does not apply (migration not required).
    Skipped,
    TimedOut,
    Cancelled,
}

impl StageStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

/// Recorded result of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: TestStage,
    pub status: StageStatus,
    pub metrics: BTreeMap<String, f64>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Whether this stage gates the pipeline.
    pub required: bool,
}

impl StageResult {
    pub fn finished(
        stage: TestStage,
        status: StageStatus,
        metrics: BTreeMap<String, f64>,
        error: Option<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            stage,
            status,
            metrics,
            error,
            started_at,
            duration_ms,
            required: true,
        }
    }

    pub fn skipped(stage: TestStage, at: DateTime<Utc>) -> Self {
        Self::finished(stage, StageStatus::Skipped, BTreeMap::new(), None, at, 0)
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Whether this result halts the pipeline.
    pub fn blocks_pipeline(&self) -> bool {
        self.required && self.status.is_failure()
    }
}

/// Whether a complete set of pipeline results permits deployment.
///
/// Every stage must be present. Required stages must have passed; only the
/// migration test may be skipped. Advisory stages are not inspected.
/// Whether that skip was legitimate depends on the proposal; see
/// [`Proposal::tests_passed`](crate::Proposal::tests_passed).
pub fn all_required_passed(results: &[StageResult]) -> bool {
    TestStage::ALL.iter().all(|stage| {
        match results.iter().find(|r| r.stage == *stage) {
            None => false,
            Some(r) if !r.required => true,
            Some(r) => match r.status {
                StageStatus::Passed => true,
                StageStatus::Skipped => *stage == TestStage::MigrationTest,
                _ => false,
            },
        }
    })
}
