//! Adversarial: any edit to a recorded audit trail is detected.

use upgrade_registry::verify_entries;
use upgrade_tests::*;
use upgrade_types::{AuditEntry, ProposalStatus, VoteDecision};

async fn recorded_trail() -> Vec<AuditEntry> {
    let world = World::builder().build().unwrap();
    let staged = world.stage("1.0.0", "1.0.1").await.unwrap();
    world.governor.deploy(&staged.id, "ops").await.unwrap();
    let rejected = world.propose("1.0.1", "1.0.2").await.unwrap();
    world
        .vote(&rejected.id, "root", ADMIN, VoteDecision::Reject)
        .await
        .unwrap();
    world
        .vote(&rejected.id, "aud", AUDITOR, VoteDecision::Reject)
        .await
        .unwrap();
    world.governor.full_audit_trail().await.unwrap()
}

#[tokio::test]
async fn untampered_trail_verifies() {
    let trail = recorded_trail().await;
    assert_eq!(trail.len(), 10);
    let check = verify_entries(&trail);
    assert!(check.is_intact(), "{:?}", check.error_message);
    assert_eq!(check.verified_entries, trail.len());

    let seqs: Vec<u64> = trail.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (1..=10).collect::<Vec<_>>());
    assert!(trail.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn rewritten_detail_is_detected() {
    let mut trail = recorded_trail().await;
    trail[4].detail = "pipeline passed (nothing to see here)".into();
    let check = verify_entries(&trail);
    assert_eq!(check.first_broken_seq, Some(5));
    assert_eq!(check.verified_entries, 4);
}

#[tokio::test]
async fn rehashed_entry_breaks_the_next_link() {
    let mut trail = recorded_trail().await;
    let staged = trail
        .iter()
        .position(|e| e.to_status == ProposalStatus::Staged)
        .unwrap();
    trail[staged].to_status = ProposalStatus::Failed;
    trail[staged].entry_hash = trail[staged].compute_hash();
    assert!(trail[staged].verify_hash());

    let check = verify_entries(&trail);
    assert_eq!(check.first_broken_seq, Some(trail[staged].seq + 1));
    assert!(check.error_message.unwrap().contains("chain link"));
}

#[tokio::test]
async fn deleted_entry_is_detected() {
    let mut trail = recorded_trail().await;
    trail.remove(3);
    let check = verify_entries(&trail);
    assert_eq!(check.first_broken_seq, Some(5));
}

#[tokio::test]
async fn reordered_entries_are_detected() {
    let mut trail = recorded_trail().await;
    trail.swap(1, 2);
    assert!(!verify_entries(&trail).is_intact());
}
