#![deny(unsafe_code)]
//! Shared data model for governed component upgrades.
//!
//! This crate provides:
//! - **Identifiers** ([`ProposalId`], [`VoterId`], [`VoterRole`], [`ComponentId`], [`ImplementationRef`]).
//! - **Lifecycle** enum with its transition table ([`ProposalStatus`]).
//! - **Proposals** and compatibility annotations ([`Proposal`], [`CompatibilityReport`]).
//! - **Votes** and tallies ([`Vote`], [`Tally`]).
//! - **Pipeline results** ([`TestStage`], [`StageResult`]).
//! - **Records** for deployment, rollback and audit ([`DeploymentRecord`], [`RollbackRecord`], [`AuditEntry`]).
//! - A [`Clock`] abstraction for deadline handling.

pub mod clock;
pub mod ids;
pub mod proposal;
pub mod records;
pub mod stage;
pub mod status;
pub mod vote;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{ComponentId, ImplementationRef, ProposalId, VoterId, VoterRole};
pub use proposal::{CompatibilityReport, NewProposal, Proposal, RiskLevel};
pub use records::{
    AuditDraft, AuditEntry, DeploymentRecord, MigrationSummary, RollbackRecord, RollbackTrigger,
    VerificationResult,
};
pub use stage::{all_required_passed, StageOutcome, StageResult, StageStatus, TestStage};
pub use status::{validate_path, ProposalStatus};
pub use vote::{Tally, TallyOutcome, Vote, VoteDecision};
