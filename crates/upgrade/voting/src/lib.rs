#![deny(unsafe_code)]
//! Weighted stakeholder voting.
//!
//! - [`VotingEngine`] validates and records votes (last write wins per voter).
//! - [`tally_votes`] is the pure decision rule, usable for replay.
//! - [`IdentityService`] resolves the authoritative role of a voter.

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod tally;

pub use config::VotingConfig;
pub use engine::VotingEngine;
pub use error::{Result, VotingError};
pub use identity::{IdentityService, StaticIdentityService};
pub use tally::tally_votes;
