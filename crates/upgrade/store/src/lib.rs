#![deny(unsafe_code)]
//! Durable store boundaries for upgrade governance.
//!
//! Backs the proposal registry, voting engine, audit trail and rollback log.
//! Any storage technology works as long as it honours atomic create,
//! compare-and-swap update and append-only audit semantics.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{AuditStore, ProposalStore, RollbackStore, UpgradeStore, VoteStore};
