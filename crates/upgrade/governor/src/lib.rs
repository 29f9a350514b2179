#![deny(unsafe_code)]
//! Upgrade governance facade.
//!
//! [`UpgradeGovernor`] connects the proposal registry, compatibility
//! analysis, weighted voting, the gated test pipeline, deployment and
//! rollback into one lifecycle. Every status change lands in the audit
//! trail.
//!
//! ```no_run
//! use upgrade_governor::{GovernorConfig, UpgradeGovernor};
//!
//! # async fn run() -> upgrade_governor::Result<()> {
//! let config = GovernorConfig::load("governor.toml")?;
//! upgrade_governor::telemetry::init_tracing(&config.governor.log_filter);
//! let governor = UpgradeGovernor::builder(config).build()?;
//! println!("{}", governor.summary().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod governor;
pub mod notify;
pub mod summary;
pub mod telemetry;

pub use config::{GovernorConfig, GovernorSettings};
pub use error::{ErrorKind, GovernorError, Result};
pub use governor::{UpgradeGovernor, UpgradeGovernorBuilder, VoteReceipt, NO_QUORUM_DETAIL};
pub use notify::{
    Audience, Notification, NotificationError, NotificationSink, RecordingNotificationSink,
    TracingNotificationSink,
};
pub use summary::GovernorSummary;
