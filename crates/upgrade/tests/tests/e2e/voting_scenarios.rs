//! E2E: weighted voting decides proposals.
//!
//! Default configuration: quorum 5, approval threshold 0.66,
//! admin=3, technical-committee=2, institutional-representative=2,
//! auditor=2, student-representative=1.

use upgrade_governor::{ErrorKind, GovernorError};
use upgrade_tests::*;
use upgrade_types::{ProposalStatus, TallyOutcome, VoteDecision, VoterRole};
use upgrade_voting::{StaticIdentityService, VotingError};

// ---------------------------------------------------------------------------
// Decision rule
// ---------------------------------------------------------------------------

#[tokio::test]
async fn weighted_majority_approves() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    let r = world.vote(&p.id, "sam", STUDENT, VoteDecision::Reject).await.unwrap();
    assert_eq!(r.tally.outcome, TallyOutcome::Pending);
    let r = world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();
    assert_eq!(r.tally.outcome, TallyOutcome::Pending, "4 of 5 weight cast");

    let r = world.vote(&p.id, "aud", AUDITOR, VoteDecision::Approve).await.unwrap();
    assert_eq!(r.tally.approve_weight, 5);
    assert_eq!(r.tally.reject_weight, 1);
    assert_eq!(r.tally.total_cast(), 6);
    assert_eq!(r.tally.outcome, TallyOutcome::Approved);
    assert_eq!(r.status, ProposalStatus::Testing);

    let path = world.governor.audit_trail(&p.id).await.unwrap();
    let statuses: Vec<_> = path.iter().map(|e| e.to_status).collect();
    assert_eq!(
        statuses,
        vec![
            ProposalStatus::Proposed,
            ProposalStatus::Voting,
            ProposalStatus::Approved,
            ProposalStatus::Testing,
        ]
    );
}

#[tokio::test]
async fn weighted_minority_rejects() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    world.vote(&p.id, "root", ADMIN, VoteDecision::Reject).await.unwrap();
    let r = world.vote(&p.id, "aud", AUDITOR, VoteDecision::Approve).await.unwrap();

    assert!((r.tally.approval_ratio() - 0.4).abs() < 1e-9);
    assert_eq!(r.tally.outcome, TallyOutcome::Rejected);
    assert_eq!(r.status, ProposalStatus::Rejected);

    let after = world
        .vote(&p.id, "tc", TECHNICAL_COMMITTEE, VoteDecision::Approve)
        .await
        .unwrap_err();
    assert_eq!(after.kind(), ErrorKind::InvalidState, "rejected is terminal");
}

#[tokio::test]
async fn abstentions_reach_quorum_but_not_approval() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    world.vote(&p.id, "root", ADMIN, VoteDecision::Abstain).await.unwrap();
    let r = world.vote(&p.id, "aud", AUDITOR, VoteDecision::Abstain).await.unwrap();

    assert!(r.tally.quorum_met());
    assert_eq!(r.tally.approval_ratio(), 0.0);
    assert_eq!(r.status, ProposalStatus::Rejected);
}

#[tokio::test]
async fn abstentions_excluded_from_ratio() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    // approve 2, reject 1, abstain 3: ratio 2/3 >= 0.66
    world.vote(&p.id, "root", ADMIN, VoteDecision::Abstain).await.unwrap();
    world.vote(&p.id, "sam", STUDENT, VoteDecision::Reject).await.unwrap();
    let r = world.vote(&p.id, "inst", INSTITUTION, VoteDecision::Approve).await.unwrap();

    assert_eq!(r.tally.total_cast(), 6);
    assert_eq!(r.tally.outcome, TallyOutcome::Approved);
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn late_vote_is_rejected_and_not_counted() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();
    let before = world.governor.tally(&p.id).await.unwrap();

    world.clock.set(p.voting_deadline + chrono::Duration::seconds(1));
    let err = world
        .vote(&p.id, "aud", AUDITOR, VoteDecision::Approve)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GovernorError::Voting(VotingError::ExpiredVotingWindow { .. })
    ));
    assert_eq!(world.governor.tally(&p.id).await.unwrap(), before);
    assert_eq!(world.governor.votes(&p.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn vote_exactly_at_deadline_counts() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.clock.set(p.voting_deadline);
    let r = world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();
    assert_eq!(r.tally.approve_weight, 3);
}

#[tokio::test]
async fn sweeper_closes_expired_windows() {
    let world = World::builder().build().unwrap();
    let undecided = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.vote(&undecided.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();
    let untouched = world.propose("1.0.0", "1.2.0").await.unwrap();

    world.clock.advance(chrono::Duration::days(8));
    let closed = world.governor.close_expired_voting().await.unwrap();
    assert_eq!(closed.len(), 2);
    for (id, status) in &closed {
        assert_eq!(*status, ProposalStatus::Rejected, "{id}");
    }
    assert_eq!(
        world.governor.get(&untouched.id).await.unwrap().status,
        ProposalStatus::Rejected
    );
    assert!(world.governor.close_expired_voting().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Eligibility and identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn latest_vote_replaces_earlier_one() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    world.vote(&p.id, "root", ADMIN, VoteDecision::Reject).await.unwrap();
    world.vote(&p.id, "root", ADMIN, VoteDecision::Abstain).await.unwrap();
    let r = world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();

    assert_eq!(r.tally.approve_weight, 3);
    assert_eq!(r.tally.reject_weight, 0);
    assert_eq!(r.tally.abstain_weight, 0);
    assert_eq!(r.tally.voter_count, 1);
}

#[tokio::test]
async fn ineligible_role_is_unauthorized() {
    let world = World::builder().build().unwrap();
    let new = world
        .new_proposal("1.0.0", "1.1.0")
        .with_eligible_roles([VoterRole::new(ADMIN), VoterRole::new(TECHNICAL_COMMITTEE)]);
    let p = world.governor.propose(new).await.unwrap();

    let err = world
        .vote(&p.id, "sam", STUDENT, VoteDecision::Approve)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnauthorizedVoter);
    assert!(world.governor.votes(&p.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn identity_service_is_authoritative() {
    let identity = StaticIdentityService::new()
        .with_voter("root", ADMIN)
        .with_voter("sam", STUDENT);
    let world = World::builder().identity(identity).build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();

    let impersonation = world
        .vote(&p.id, "sam", ADMIN, VoteDecision::Approve)
        .await
        .unwrap_err();
    assert_eq!(impersonation.kind(), ErrorKind::UnauthorizedVoter);

    let stranger = world
        .vote(&p.id, "mallory", AUDITOR, VoteDecision::Approve)
        .await
        .unwrap_err();
    assert_eq!(stranger.kind(), ErrorKind::NotFound);

    world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();
    assert_eq!(world.governor.votes(&p.id).await.unwrap().len(), 1);
}
