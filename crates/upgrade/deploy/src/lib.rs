#![deny(unsafe_code)]
//! Deployment and rollback of approved upgrades.
//!
//! - [`DeploymentOrchestrator`] swaps the live implementation pointer,
//!   migrates data and verifies the result under a per-component lock.
//! - [`RollbackManager`] restores a previous implementation, automatically
//!   after a failed deployment or on operator request.
//! - [`LedgerClient`] and [`MigrationRunner`] are the external boundaries,
//!   with in-process simulations for tests and demos.

pub mod error;
pub mod ledger;
pub mod locks;
pub mod migration;
pub mod orchestrator;
pub mod rollback;

pub use error::{DeployError, DeployStep, Result};
pub use ledger::{InMemoryLedger, LedgerClient, LedgerError, LedgerOp};
pub use locks::{ComponentGuard, ComponentLocks, LockMode};
pub use migration::{MigrationContext, MigrationError, MigrationRunner, SimulatedMigrationRunner};
pub use orchestrator::{DeploymentConfig, DeploymentOrchestrator, DEPLOYMENT_FAILED_REASON};
pub use rollback::RollbackManager;
