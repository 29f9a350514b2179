#![deny(unsafe_code)]
//! Compatibility analysis for upgrade proposals.
//!
//! Analysis runs once, when a proposal is created, and produces an advisory
//! [`CompatibilityReport`]. Only `migration_required` has operational
//! effect downstream.

use async_trait::async_trait;
use semver::Version;
use thiserror::Error;
use tracing::debug;
use upgrade_types::{CompatibilityReport, Proposal, RiskLevel};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompatError {
    #[error("unparseable version {version:?}: {reason}")]
    UnparseableVersion { version: String, reason: String },

    #[error("analysis unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CompatError>;

/// Pluggable compatibility analysis capability.
#[async_trait]
pub trait CompatibilityAnalyzer: Send + Sync {
    async fn analyze(&self, proposal: &Proposal) -> Result<CompatibilityReport>;

    fn name(&self) -> &str;
}

// ── Static ─────────────────────────────────────────────────────────────

/// Returns the same answer for every proposal.
pub struct StaticCompatibilityAnalyzer {
    outcome: Result<CompatibilityReport>,
}

impl StaticCompatibilityAnalyzer {
    pub fn new(report: CompatibilityReport) -> Self {
        Self {
            outcome: Ok(report),
        }
    }

    /// No incompatibility, no migration.
    pub fn compatible() -> Self {
        Self::new(CompatibilityReport::compatible())
    }

    /// Always fails with [`CompatError::Unavailable`].
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(CompatError::Unavailable(reason.into())),
        }
    }
}

#[async_trait]
impl CompatibilityAnalyzer for StaticCompatibilityAnalyzer {
    async fn analyze(&self, _proposal: &Proposal) -> Result<CompatibilityReport> {
        self.outcome.clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}

// ── Semantic versioning ────────────────────────────────────────────────

/// Classifies a proposal from its version pair.
///
/// | change | breaking | storage | migration | risk |
/// |---|---|---|---|---|
/// | major bump or downgrade | yes | yes | yes | high |
/// | minor bump | no | no | no | medium |
/// | patch bump | no | no | no | low |
///
/// Below 1.0.0 a minor bump is treated as a major one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverCompatibilityAnalyzer;

impl SemverCompatibilityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Classify `current -> target` without a proposal.
    pub fn classify(&self, current: &str, target: &str) -> Result<CompatibilityReport> {
        let from = parse(current)?;
        let to = parse(target)?;

        let report = if to < from {
            breaking(format!("downgrade {from} -> {to}"))
        } else if to.major != from.major {
            breaking(format!("major version bump {from} -> {to}"))
        } else if from.major == 0 && to.minor != from.minor {
            breaking(format!("pre-1.0 minor bump {from} -> {to}"))
        } else if to.minor != from.minor {
            CompatibilityReport {
                risk_level: RiskLevel::Medium,
                ..CompatibilityReport::compatible()
            }
            .with_note(format!("minor version bump {from} -> {to}"))
        } else {
            CompatibilityReport::compatible().with_note(format!("patch-level change {from} -> {to}"))
        };
        debug!(%from, %to, risk = %report.risk_level, "classified version change");
        Ok(report)
    }
}

#[async_trait]
impl CompatibilityAnalyzer for SemverCompatibilityAnalyzer {
    async fn analyze(&self, proposal: &Proposal) -> Result<CompatibilityReport> {
        self.classify(&proposal.current_version, &proposal.target_version)
    }

    fn name(&self) -> &str {
        "semver"
    }
}

fn parse(version: &str) -> Result<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|e| CompatError::UnparseableVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

fn breaking(note: String) -> CompatibilityReport {
    CompatibilityReport {
        breaking_api_change: true,
        storage_layout_change: true,
        migration_required: true,
        risk_level: RiskLevel::High,
        notes: vec![note],
    }
}
