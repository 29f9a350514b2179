//! Property tests: only each voter's latest vote counts, and the tally
//! does not depend on the order votes arrive in.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use upgrade_store::{InMemoryStore, VoteStore};
use upgrade_types::{ProposalId, Vote, VoteDecision, VoterId, VoterRole};
use upgrade_voting::{tally_votes, VotingConfig};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const ROLES: [(&str, u32); 5] = [
    ("admin", 3),
    ("technical-committee", 2),
    ("institutional-representative", 2),
    ("auditor", 2),
    ("student-representative", 1),
];

fn arb_decision() -> impl Strategy<Value = VoteDecision> {
    prop_oneof![
        Just(VoteDecision::Approve),
        Just(VoteDecision::Reject),
        Just(VoteDecision::Abstain),
    ]
}

/// A stream of (voter index, decision) casts; voters may repeat.
fn arb_casts() -> impl Strategy<Value = Vec<(usize, VoteDecision)>> {
    prop::collection::vec((0..ROLES.len(), arb_decision()), 1..40)
}

fn to_votes(proposal_id: ProposalId, casts: &[(usize, VoteDecision)]) -> Vec<Vote> {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    casts
        .iter()
        .enumerate()
        .map(|(i, (voter, decision))| {
            let (role, weight) = ROLES[*voter];
            Vote {
                proposal_id,
                voter_id: VoterId::new(format!("voter-{voter}")),
                voter_role: VoterRole::new(role),
                decision: *decision,
                justification: format!("cast {i}"),
                cast_at: base + Duration::seconds(i as i64),
                weight,
            }
        })
        .collect()
}

fn latest_per_voter(votes: &[Vote]) -> Vec<Vote> {
    let mut latest = BTreeMap::new();
    for vote in votes {
        latest.insert(vote.voter_id.clone(), vote.clone());
    }
    latest.into_values().collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Storing every cast keeps exactly one live vote per voter: the last.
    #[test]
    fn store_keeps_latest_vote(casts in arb_casts()) {
        let proposal_id = ProposalId::generate();
        let votes = to_votes(proposal_id, &casts);
        let store = InMemoryStore::new();

        let live = runtime().block_on(async {
            for vote in &votes {
                store.upsert_vote(vote.clone()).await.unwrap();
            }
            store.votes_for(&proposal_id).await.unwrap()
        });

        let expected = latest_per_voter(&votes);
        prop_assert_eq!(live.len(), expected.len());
        for vote in &expected {
            let stored = live.iter().find(|v| v.voter_id == vote.voter_id).unwrap();
            prop_assert_eq!(stored.decision, vote.decision);
            prop_assert_eq!(&stored.justification, &vote.justification);
        }

        let config = VotingConfig::default();
        prop_assert_eq!(tally_votes(&live, &config), tally_votes(&expected, &config));
    }

    /// Re-casting an identical vote never changes the tally.
    #[test]
    fn recasting_is_idempotent(casts in arb_casts(), repeats in 1usize..4) {
        let proposal_id = ProposalId::generate();
        let votes = latest_per_voter(&to_votes(proposal_id, &casts));
        let store = InMemoryStore::new();
        let config = VotingConfig::default();

        let (once, many) = runtime().block_on(async {
            for vote in &votes {
                store.upsert_vote(vote.clone()).await.unwrap();
            }
            let once = store.votes_for(&proposal_id).await.unwrap();
            for _ in 0..repeats {
                for vote in &votes {
                    store.upsert_vote(vote.clone()).await.unwrap();
                }
            }
            (once, store.votes_for(&proposal_id).await.unwrap())
        });

        prop_assert_eq!(tally_votes(&once, &config), tally_votes(&many, &config));
    }

    /// The decision rule is a pure function of the vote set.
    #[test]
    fn tally_is_order_independent(casts in arb_casts(), seed in any::<u64>()) {
        let votes = latest_per_voter(&to_votes(ProposalId::generate(), &casts));
        let config = VotingConfig::default();
        let forward = tally_votes(&votes, &config);

        let mut reversed = votes.clone();
        reversed.reverse();
        prop_assert_eq!(tally_votes(&reversed, &config), forward.clone());

        let mut rotated = votes.clone();
        let len = rotated.len();
        rotated.rotate_left((seed as usize) % len);
        prop_assert_eq!(tally_votes(&rotated, &config), forward);
    }

    /// Weight totals always equal the sum of the live votes' weights.
    #[test]
    fn weights_are_conserved(casts in arb_casts()) {
        let votes = latest_per_voter(&to_votes(ProposalId::generate(), &casts));
        let tally = tally_votes(&votes, &VotingConfig::default());
        let total: u64 = votes.iter().map(|v| u64::from(v.weight)).sum();
        prop_assert_eq!(tally.total_cast(), total);
        prop_assert_eq!(tally.voter_count, votes.len());
    }
}
