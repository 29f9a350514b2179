//! Vote casting and tallying against stored proposals.

use std::sync::Arc;

use tracing::{info, instrument};
use upgrade_store::{ProposalStore, VoteStore};
use upgrade_types::{
    Clock, Proposal, ProposalId, ProposalStatus, Tally, Vote, VoteDecision, VoterId, VoterRole,
};

use crate::config::VotingConfig;
use crate::error::{Result, VotingError};
use crate::identity::IdentityService;
use crate::tally::tally_votes;

/// Collects weighted votes on proposals in `Voting`.
///
/// The engine never changes proposal status; callers act on the
/// [`Tally`] it returns.
pub struct VotingEngine {
    proposals: Arc<dyn ProposalStore>,
    votes: Arc<dyn VoteStore>,
    identity: Option<Arc<dyn IdentityService>>,
    clock: Arc<dyn Clock>,
    config: VotingConfig,
}

impl VotingEngine {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        votes: Arc<dyn VoteStore>,
        clock: Arc<dyn Clock>,
        config: VotingConfig,
    ) -> Self {
        Self {
            proposals,
            votes,
            identity: None,
            clock,
            config,
        }
    }

    /// Check declared roles against an identity service.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityService>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    /// Record or replace `voter_id`'s vote on `proposal_id`.
    #[instrument(skip(self, justification), fields(proposal = %proposal_id, voter = %voter_id, role = %voter_role))]
    pub async fn cast_vote(
        &self,
        proposal_id: &ProposalId,
        voter_id: &VoterId,
        voter_role: &VoterRole,
        decision: VoteDecision,
        justification: &str,
    ) -> Result<Vote> {
        let proposal = self.load(proposal_id).await?;
        if proposal.status != ProposalStatus::Voting {
            return Err(VotingError::InvalidState {
                id: *proposal_id,
                status: proposal.status,
            });
        }

        let now = self.clock.now();
        if now > proposal.voting_deadline {
            return Err(VotingError::ExpiredVotingWindow {
                id: *proposal_id,
                deadline: proposal.voting_deadline,
            });
        }

        if !proposal.is_role_eligible(voter_role) {
            return Err(VotingError::UnauthorizedVoter {
                voter: voter_id.clone(),
                role: voter_role.clone(),
                reason: "role is not eligible for this proposal".into(),
            });
        }

        if let Some(identity) = &self.identity {
            match identity.resolve_role(voter_id).await {
                None => return Err(VotingError::UnknownVoter(voter_id.clone())),
                Some(actual) if actual != *voter_role => {
                    return Err(VotingError::UnauthorizedVoter {
                        voter: voter_id.clone(),
                        role: voter_role.clone(),
                        reason: format!("voter holds role {actual}"),
                    })
                }
                Some(_) => {}
            }
        }

        let weight = self.config.weight_for(voter_role).ok_or_else(|| {
            VotingError::Validation(format!("role {voter_role} has no configured weight"))
        })?;

        let vote = Vote {
            proposal_id: *proposal_id,
            voter_id: voter_id.clone(),
            voter_role: voter_role.clone(),
            decision,
            justification: justification.to_string(),
            cast_at: now,
            weight,
        };
        let replaced = self.votes.upsert_vote(vote.clone()).await?;

        info!(
            %decision,
            weight,
            replaced = replaced.is_some(),
            "vote recorded"
        );
        Ok(vote)
    }

    /// Current weighted tally. Has no side effects.
    pub async fn tally(&self, proposal_id: &ProposalId) -> Result<Tally> {
        self.load(proposal_id).await?;
        let votes = self.votes.votes_for(proposal_id).await?;
        Ok(tally_votes(&votes, &self.config))
    }

    /// Live votes ordered by cast time.
    pub async fn votes(&self, proposal_id: &ProposalId) -> Result<Vec<Vote>> {
        Ok(self.votes.votes_for(proposal_id).await?)
    }

    async fn load(&self, id: &ProposalId) -> Result<Proposal> {
        self.proposals
            .get(id)
            .await?
            .ok_or(VotingError::NotFound(*id))
    }
}
