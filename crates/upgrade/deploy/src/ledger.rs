//! Ledger client boundary and an in-memory ledger with fault injection.
//!
//! The ledger owns the "current implementation" pointer of each component.
//! Publishing a payload makes it live; repointing makes an earlier
//! implementation live again.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use upgrade_types::{ComponentId, ImplementationRef};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("unknown component: {0}")]
    UnknownComponent(ComponentId),

    #[error("unknown implementation ref {reference} for {component}")]
    UnknownRef {
        component: ComponentId,
        reference: ImplementationRef,
    },
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Publish `payload` and make it the live implementation of `component`.
    async fn publish(&self, component: &ComponentId, payload: &[u8])
        -> Result<ImplementationRef, LedgerError>;

    async fn current_ref(&self, component: &ComponentId) -> Result<ImplementationRef, LedgerError>;

    /// Whether `reference` is finalised on the ledger.
    async fn confirm(&self, reference: &ImplementationRef) -> Result<bool, LedgerError>;

    /// Make a previously published implementation live again.
    async fn repoint(&self, component: &ComponentId, reference: &ImplementationRef)
        -> Result<(), LedgerError>;
}

/// Operations that can be individually broken on [`InMemoryLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Publish,
    CurrentRef,
    Confirm,
    Repoint,
}

#[derive(Default)]
struct LedgerState {
    live: HashMap<ComponentId, ImplementationRef>,
    published: HashMap<ImplementationRef, ComponentId>,
    /// Every pointer change in order.
    history: Vec<(ComponentId, ImplementationRef)>,
    counter: u64,
}

#[derive(Default)]
struct Faults {
    failing: HashSet<LedgerOp>,
    delays: HashMap<LedgerOp, Duration>,
    reject_confirmations: bool,
}

/// In-process ledger for tests and demos.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    faults: Mutex<Faults>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `component` with a live implementation.
    pub fn with_component(self, component: impl Into<String>, reference: impl Into<String>) -> Self {
        self.seed(ComponentId::new(component), ImplementationRef::new(reference));
        self
    }

    pub fn seed(&self, component: ComponentId, reference: ImplementationRef) {
        let mut state = self.state.lock();
        state.published.insert(reference.clone(), component.clone());
        state.history.push((component.clone(), reference.clone()));
        state.live.insert(component, reference);
    }

    /// Make `op` fail with [`LedgerError::Unavailable`] until healed.
    pub fn fail(&self, op: LedgerOp) {
        self.faults.lock().failing.insert(op);
    }

    pub fn heal(&self, op: LedgerOp) {
        self.faults.lock().failing.remove(&op);
    }

    pub fn set_delay(&self, op: LedgerOp, delay: Duration) {
        self.faults.lock().delays.insert(op, delay);
    }

    /// Make `confirm` answer `false` for every reference.
    pub fn reject_confirmations(&self, reject: bool) {
        self.faults.lock().reject_confirmations = reject;
    }

    /// Live pointer without going through the async client.
    pub fn live_ref(&self, component: &ComponentId) -> Option<ImplementationRef> {
        self.state.lock().live.get(component).cloned()
    }

    pub fn history(&self, component: &ComponentId) -> Vec<ImplementationRef> {
        self.state
            .lock()
            .history
            .iter()
            .filter(|(c, _)| c == component)
            .map(|(_, r)| r.clone())
            .collect()
    }

    async fn gate(&self, op: LedgerOp) -> Result<(), LedgerError> {
        let (failing, delay) = {
            let faults = self.faults.lock();
            (faults.failing.contains(&op), faults.delays.get(&op).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(LedgerError::Unavailable(format!("{op:?} failed (injected)")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn publish(
        &self,
        component: &ComponentId,
        payload: &[u8],
    ) -> Result<ImplementationRef, LedgerError> {
        self.gate(LedgerOp::Publish).await?;
        let mut state = self.state.lock();
        state.counter += 1;
        let digest = blake3::hash(payload).to_hex();
        let reference = ImplementationRef::new(format!(
            "{}@{}-{}",
            component.as_str(),
            state.counter,
            &digest.as_str()[..12]
        ));
        state.published.insert(reference.clone(), component.clone());
        state.history.push((component.clone(), reference.clone()));
        state.live.insert(component.clone(), reference.clone());
        Ok(reference)
    }

    async fn current_ref(&self, component: &ComponentId) -> Result<ImplementationRef, LedgerError> {
        self.gate(LedgerOp::CurrentRef).await?;
        self.live_ref(component)
            .ok_or_else(|| LedgerError::UnknownComponent(component.clone()))
    }

    async fn confirm(&self, reference: &ImplementationRef) -> Result<bool, LedgerError> {
        self.gate(LedgerOp::Confirm).await?;
        if self.faults.lock().reject_confirmations {
            return Ok(false);
        }
        Ok(self.state.lock().published.contains_key(reference))
    }

    async fn repoint(
        &self,
        component: &ComponentId,
        reference: &ImplementationRef,
    ) -> Result<(), LedgerError> {
        self.gate(LedgerOp::Repoint).await?;
        let mut state = self.state.lock();
        if state.published.get(reference) != Some(component) {
            return Err(LedgerError::UnknownRef {
                component: component.clone(),
                reference: reference.clone(),
            });
        }
        state.history.push((component.clone(), reference.clone()));
        state.live.insert(component.clone(), reference.clone());
        Ok(())
    }
}
