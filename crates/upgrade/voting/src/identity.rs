//! Identity/authorization service boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use upgrade_types::{VoterId, VoterRole};

/// Resolves the authoritative role of a voter.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// `None` when the voter is unknown.
    async fn resolve_role(&self, voter: &VoterId) -> Option<VoterRole>;
}

/// Fixed voter → role directory.
#[derive(Default)]
pub struct StaticIdentityService {
    roles: RwLock<HashMap<VoterId, VoterRole>>,
}

impl StaticIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voter(self, voter: impl Into<String>, role: impl Into<String>) -> Self {
        self.register(VoterId::new(voter), VoterRole::new(role));
        self
    }

    pub fn register(&self, voter: VoterId, role: VoterRole) {
        self.roles.write().insert(voter, role);
    }

    pub fn revoke(&self, voter: &VoterId) -> Option<VoterRole> {
        self.roles.write().remove(voter)
    }
}

#[async_trait]
impl IdentityService for StaticIdentityService {
    async fn resolve_role(&self, voter: &VoterId) -> Option<VoterRole> {
        self.roles.read().get(voter).cloned()
    }
}
