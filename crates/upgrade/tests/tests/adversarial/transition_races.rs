//! Adversarial: concurrent writers on one proposal.

use std::sync::Arc;

use futures::future::join_all;
use upgrade_registry::{AuditTrail, ProposalRegistry, RegistryError};
use upgrade_store::InMemoryStore;
use upgrade_tests::*;
use upgrade_types::{
    Clock, ComponentId, NewProposal, ProposalStatus, SystemClock, VoteDecision, VoterId, VoterRole,
};

fn registry() -> (Arc<ProposalRegistry>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let roles = [VoterRole::new(ADMIN)].into_iter().collect();
    (Arc::new(ProposalRegistry::new(store.clone(), clock, roles)), store)
}

fn new_proposal() -> NewProposal {
    NewProposal::new(
        ComponentId::new(COMPONENT),
        "1.0.0",
        "1.1.0",
        vec![0xAB],
        VoterId::new("proposer"),
        chrono::Utc::now() + chrono::Duration::hours(1),
    )
}

#[tokio::test]
async fn exactly_one_cas_winner() {
    let (registry, store) = registry();
    let p = registry.create(new_proposal(), "proposer").await.unwrap();
    registry
        .transition(&p.id, ProposalStatus::Proposed, ProposalStatus::Voting, "gov", "open")
        .await
        .unwrap();

    let racers = (0..16).map(|i| {
        let registry = registry.clone();
        let id = p.id;
        let next = if i % 2 == 0 {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        };
        tokio::spawn(async move {
            registry
                .transition(&id, ProposalStatus::Voting, next, &format!("racer-{i}"), "decide")
                .await
        })
    });
    let outcomes: Vec<_> = join_all(racers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let final_status = winners[0].status;

    for loser in outcomes.iter().filter_map(|o| o.as_ref().err()) {
        match loser {
            RegistryError::Conflict { actual, .. } => assert_eq!(*actual, final_status),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(loser.is_retryable());
    }

    assert_eq!(registry.get(&p.id).await.unwrap().status, final_status);
    let trail = AuditTrail::new(store).query(&p.id).await.unwrap();
    assert_eq!(trail.len(), 3, "creation, open and a single decision");
}

#[tokio::test]
async fn concurrent_voters_decide_once() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    let voters = [
        ("root", ADMIN),
        ("tc", TECHNICAL_COMMITTEE),
        ("inst", INSTITUTION),
        ("aud", AUDITOR),
        ("sam", STUDENT),
    ];
    let casts = voters.iter().map(|(voter, role)| {
        let governor = world.governor.clone();
        let id = p.id;
        let voter = VoterId::new(*voter);
        let role = VoterRole::new(*role);
        tokio::spawn(async move {
            governor
                .cast_vote(&id, &voter, &role, VoteDecision::Approve, "lgtm")
                .await
        })
    });
    let receipts: Vec<_> = join_all(casts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    // Votes landing after the decision are refused, never double-counted.
    assert!(receipts.iter().filter(|r| r.is_ok()).count() >= 2);

    let trail = world.governor.audit_trail(&p.id).await.unwrap();
    let approvals = trail
        .iter()
        .filter(|e| e.to_status == ProposalStatus::Approved)
        .count();
    assert_eq!(approvals, 1);
    assert_eq!(
        world.governor.get(&p.id).await.unwrap().status,
        ProposalStatus::Testing
    );
    world.governor.validate_lifecycle(&p.id).await.unwrap();
}

#[tokio::test]
async fn cancel_races_approval() {
    for _ in 0..10 {
        let world = World::builder().build().unwrap();
        let p = world.propose("1.0.0", "1.1.0").await.unwrap();
        world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();

        let approve = {
            let governor = world.governor.clone();
            let id = p.id;
            tokio::spawn(async move {
                governor
                    .cast_vote(
                        &id,
                        &VoterId::new("aud"),
                        &VoterRole::new(AUDITOR),
                        VoteDecision::Approve,
                        "",
                    )
                    .await
            })
        };
        let cancel = {
            let governor = world.governor.clone();
            let id = p.id;
            tokio::spawn(async move { governor.cancel(&id, "ops", "withdrawn").await })
        };
        let _ = approve.await.unwrap();
        let _ = cancel.await.unwrap();

        let status = world.governor.get(&p.id).await.unwrap().status;
        assert!(
            matches!(status, ProposalStatus::Cancelled | ProposalStatus::Testing),
            "{status}"
        );
        world.governor.validate_lifecycle(&p.id).await.unwrap();
    }
}
