//! Data migration boundary.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use upgrade_types::{ComponentId, ImplementationRef, MigrationSummary, ProposalId};

/// Inputs to a migration run.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    pub proposal_id: ProposalId,
    pub component: ComponentId,
    pub from_version: String,
    pub to_version: String,
    pub previous_ref: ImplementationRef,
    pub new_ref: ImplementationRef,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("migration failed: {0}")]
pub struct MigrationError(pub String);

#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn migrate(&self, ctx: &MigrationContext) -> Result<MigrationSummary, MigrationError>;
}

/// Scripted migration runner.
pub struct SimulatedMigrationRunner {
    records: u64,
    failure: Option<String>,
    delay: Option<Duration>,
    runs: AtomicUsize,
}

impl SimulatedMigrationRunner {
    /// Succeeds, reporting `records` migrated rows.
    pub fn new(records: u64) -> Self {
        Self {
            records,
            failure: None,
            delay: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedMigrationRunner {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl MigrationRunner for SimulatedMigrationRunner {
    async fn migrate(&self, ctx: &MigrationContext) -> Result<MigrationSummary, MigrationError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(MigrationError(reason.clone()));
        }
        Ok(MigrationSummary {
            records_migrated: self.records,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            notes: format!(
                "{} {} -> {}",
                ctx.component, ctx.from_version, ctx.to_version
            ),
        })
    }
}
