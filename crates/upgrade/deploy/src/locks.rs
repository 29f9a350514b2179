//! Per-component exclusive locks.
//!
//! Every pointer change (deployment steps 2–6 and every rollback) runs
//! while holding the [`ComponentGuard`] for its component.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use upgrade_types::ComponentId;

use crate::error::{DeployError, Result};

/// Behaviour when the component is already locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Wait for the holder to finish.
    #[default]
    Block,
    /// Return [`DeployError::Conflict`] immediately.
    FailFast,
}

#[derive(Default)]
pub struct ComponentLocks {
    locks: DashMap<ComponentId, Arc<Mutex<()>>>,
    mode: LockMode,
}

/// Proof of exclusive access to one component.
pub struct ComponentGuard {
    component: ComponentId,
    _guard: OwnedMutexGuard<()>,
}

impl ComponentGuard {
    pub fn component(&self) -> &ComponentId {
        &self.component
    }
}

impl ComponentLocks {
    pub fn new(mode: LockMode) -> Self {
        Self {
            locks: DashMap::new(),
            mode,
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub async fn acquire(&self, component: &ComponentId) -> Result<ComponentGuard> {
        // Clone the Arc out so no map shard lock is held across the await.
        let lock = self
            .locks
            .entry(component.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match self.mode {
            LockMode::Block => lock.lock_owned().await,
            LockMode::FailFast => lock.try_lock_owned().map_err(|_| {
                DeployError::Conflict(format!("{component} is locked by another operation"))
            })?,
        };
        debug!(%component, "component lock acquired");
        Ok(ComponentGuard {
            component: component.clone(),
            _guard: guard,
        })
    }

    pub fn is_locked(&self, component: &ComponentId) -> bool {
        match self.locks.get(component) {
            Some(lock) => {
                let held = lock.try_lock().is_err();
                held
            }
            None => false,
        }
    }
}
