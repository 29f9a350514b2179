//! Best-effort notifications to voters, stakeholders and operators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use upgrade_types::{ComponentId, ImplementationRef, ProposalId, ProposalStatus, VoterRole};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Who a notification is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    EligibleVoters,
    Stakeholders,
    Operators,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    VotingOpened {
        proposal_id: ProposalId,
        component: ComponentId,
        target_version: String,
        eligible_roles: Vec<VoterRole>,
        voting_deadline: DateTime<Utc>,
    },
    Decided {
        proposal_id: ProposalId,
        status: ProposalStatus,
        detail: String,
    },
    Deployed {
        proposal_id: ProposalId,
        component: ComponentId,
        implementation_ref: ImplementationRef,
    },
    RolledBack {
        proposal_id: Option<ProposalId>,
        component: ComponentId,
        restored_ref: ImplementationRef,
        reason: String,
    },
    /// Operator alert: the component may be left on an unverified
    /// implementation.
    RollbackFailed { component: ComponentId, reason: String },
    /// Operator alert: a deployment outcome was not recorded and the
    /// proposal needs reconciling.
    DeploymentStranded {
        proposal_id: ProposalId,
        status: ProposalStatus,
        reason: String,
    },
}

impl Notification {
    pub fn audience(&self) -> Audience {
        match self {
            Self::VotingOpened { .. } => Audience::EligibleVoters,
            Self::Decided { .. } | Self::Deployed { .. } | Self::RolledBack { .. } => {
                Audience::Stakeholders
            }
            Self::RollbackFailed { .. } | Self::DeploymentStranded { .. } => Audience::Operators,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::VotingOpened { .. } => "voting_opened",
            Self::Decided { .. } => "decided",
            Self::Deployed { .. } => "deployed",
            Self::RolledBack { .. } => "rolled_back",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::DeploymentStranded { .. } => "deployment_stranded",
        }
    }

    pub fn proposal_id(&self) -> Option<ProposalId> {
        match self {
            Self::VotingOpened { proposal_id, .. }
            | Self::Decided { proposal_id, .. }
            | Self::Deployed { proposal_id, .. }
            | Self::DeploymentStranded { proposal_id, .. } => Some(*proposal_id),
            Self::RolledBack { proposal_id, .. } => *proposal_id,
            Self::RollbackFailed { .. } => None,
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VotingOpened {
                proposal_id,
                component,
                target_version,
                voting_deadline,
                ..
            } => write!(
                f,
                "voting opened on {proposal_id} ({component} -> {target_version}) until {voting_deadline}"
            ),
            Self::Decided {
                proposal_id,
                status,
                detail,
            } => write!(f, "{proposal_id} is now {status}: {detail}"),
            Self::Deployed {
                proposal_id,
                component,
                implementation_ref,
            } => write!(f, "{proposal_id} deployed, {component} now at {implementation_ref}"),
            Self::RolledBack {
                component,
                restored_ref,
                reason,
                ..
            } => write!(f, "{component} rolled back to {restored_ref}: {reason}"),
            Self::RollbackFailed { component, reason } => {
                write!(f, "ROLLBACK FAILED for {component}: {reason}")
            }
            Self::DeploymentStranded {
                proposal_id,
                status,
                reason,
            } => write!(f, "DEPLOYMENT STRANDED: {proposal_id} left in {status}: {reason}"),
        }
    }
}

/// Outbound notification channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Send without waiting. Delivery failures are logged and dropped.
pub fn dispatch(sink: &Arc<dyn NotificationSink>, notification: Notification) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let kind = notification.kind();
        if let Err(e) = sink.notify(notification).await {
            warn!(kind, error = %e, "notification dropped");
        }
    });
}

// ── Tracing ────────────────────────────────────────────────────────────

/// Writes every notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        let audience = notification.audience();
        match audience {
            Audience::Operators => error!(?audience, kind = notification.kind(), "{notification}"),
            _ => info!(?audience, kind = notification.kind(), "{notification}"),
        }
        Ok(())
    }
}

// ── Recording ──────────────────────────────────────────────────────────

/// Keeps delivered notifications in memory.
#[derive(Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every delivery while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.delivered.lock().iter().filter(|n| n.kind() == kind).count()
    }

    /// Poll until a notification matching `pred` arrives or `timeout` passes.
    pub async fn wait_for<F>(&self, timeout: Duration, pred: F) -> Option<Notification>
    where
        F: Fn(&Notification) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(found) = self.delivered.lock().iter().find(|n| pred(n)).cloned() {
                return Some(found);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError("sink offline".into()));
        }
        self.delivered.lock().push(notification);
        Ok(())
    }
}
