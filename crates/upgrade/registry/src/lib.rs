#![deny(unsafe_code)]
//! Proposal registry and audit trail.
//!
//! [`ProposalRegistry`] is the single owner of proposal state. Status changes
//! are compare-and-swap operations validated against the lifecycle table and
//! recorded in the [`AuditTrail`] atomically.

pub mod audit;
pub mod error;
pub mod registry;

pub use audit::{verify_entries, AuditTrail, ChainVerification};
pub use error::{RegistryError, Result};
pub use registry::ProposalRegistry;
