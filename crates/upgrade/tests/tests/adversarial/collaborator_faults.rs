//! Adversarial: storage and ledger misbehave mid-lifecycle.

use std::time::Duration;

use upgrade_compat::SemverCompatibilityAnalyzer;
use upgrade_deploy::{DeployError, DeployStep, LedgerOp, SimulatedMigrationRunner};
use upgrade_governor::{ErrorKind, GovernorError, Notification};
use upgrade_tests::*;
use upgrade_types::{ImplementationRef, ProposalStatus, VoteDecision};

fn genesis() -> ImplementationRef {
    ImplementationRef::new(GENESIS_REF)
}

fn failed_step(err: &GovernorError) -> (DeployStep, bool) {
    match err {
        GovernorError::Deploy(DeployError::DeploymentFailed {
            step, rolled_back, ..
        }) => (*step, *rolled_back),
        other => panic!("expected a deployment failure, got {other:?}"),
    }
}

// ----------------------------------------------------------------------------
// Store outages
// ----------------------------------------------------------------------------

#[tokio::test]
async fn store_outage_is_fatal_and_recoverable() {
    let world = World::builder().build().unwrap();
    let p = world.propose("1.0.0", "1.0.1").await.unwrap();

    world.store.set_available(false);
    let err = world.propose("1.0.0", "1.0.2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.is_fatal());

    let err = world
        .vote(&p.id, "root", ADMIN, VoteDecision::Approve)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

    world.store.set_available(true);
    let receipt = world.vote(&p.id, "root", ADMIN, VoteDecision::Approve).await.unwrap();
    assert_eq!(receipt.status, ProposalStatus::Voting);
    assert_eq!(world.store.proposal_count(), 1);
    assert!(world.governor.verify_audit_chain().await.unwrap().is_intact());
}

// ----------------------------------------------------------------------------
// Ledger faults during deployment
// ----------------------------------------------------------------------------

#[tokio::test]
async fn unconfirmed_publish_is_rolled_back() {
    let world = World::builder().build().unwrap();
    let staged = world.stage("1.0.0", "1.0.1").await.unwrap();
    world.ledger.reject_confirmations(true);

    let err = world.governor.deploy(&staged.id, "ops").await.unwrap_err();
    assert_eq!(failed_step(&err), (DeployStep::Verify, true));

    assert_eq!(world.ledger.live_ref(&component()), Some(genesis()));
    assert_eq!(
        world.governor.get(&staged.id).await.unwrap().status,
        ProposalStatus::Failed
    );
    world.governor.validate_lifecycle(&staged.id).await.unwrap();
}

#[tokio::test]
async fn unreadable_pointer_fails_before_any_swap() {
    let world = World::builder().build().unwrap();
    let staged = world.stage("1.0.0", "1.0.1").await.unwrap();
    world.ledger.fail(LedgerOp::CurrentRef);

    let err = world.governor.deploy(&staged.id, "ops").await.unwrap_err();
    assert_eq!(failed_step(&err), (DeployStep::ReadCurrent, false));

    world.ledger.heal(LedgerOp::CurrentRef);
    assert_eq!(world.ledger.history(&component()), vec![genesis()]);
    assert!(world
        .governor
        .rollback_history(&component())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn slow_publish_times_out() {
    let world = World::builder()
        .config(|c| c.deployment.step_timeout_ms = 50)
        .build()
        .unwrap();
    let staged = world.stage("1.0.0", "1.0.1").await.unwrap();
    world.ledger.set_delay(LedgerOp::Publish, Duration::from_millis(500));

    let err = world.governor.deploy(&staged.id, "ops").await.unwrap_err();
    let (step, rolled_back) = failed_step(&err);
    assert_eq!(step, DeployStep::Publish);
    assert!(!rolled_back, "the abandoned publish never swapped the pointer");
    assert!(err.to_string().contains("timed out"), "{err}");
    assert_eq!(world.ledger.live_ref(&component()), Some(genesis()));
}

#[tokio::test]
async fn failed_rollback_raises_operator_alert() {
    let world = World::builder()
        .analyzer(SemverCompatibilityAnalyzer::new())
        .migrations(SimulatedMigrationRunner::failing("schema drift"))
        .build()
        .unwrap();
    let staged = world.stage("1.4.0", "2.0.0").await.unwrap();
    world.ledger.fail(LedgerOp::Repoint);

    let err = world.governor.deploy(&staged.id, "ops").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RollbackFailed);
    assert!(err.is_fatal());

    // The new implementation is stranded live; the proposal still fails.
    assert_ne!(world.ledger.live_ref(&component()), Some(genesis()));
    assert_eq!(
        world.governor.get(&staged.id).await.unwrap().status,
        ProposalStatus::Failed
    );

    let alert = world
        .notifications
        .wait_for(Duration::from_secs(1), |n| {
            matches!(n, Notification::RollbackFailed { .. })
        })
        .await
        .unwrap();
    assert_eq!(alert.kind(), "rollback_failed");

    // Once the ledger heals an operator can restore by hand.
    world.ledger.heal(LedgerOp::Repoint);
    world
        .governor
        .rollback_component(&component(), &genesis(), "manual recovery", "oncall")
        .await
        .unwrap();
    assert_eq!(world.ledger.live_ref(&component()), Some(genesis()));
}

#[tokio::test]
async fn failed_manual_rollback_is_recorded_and_audited() {
    let world = World::builder().build().unwrap();
    let staged = world.stage("1.0.0", "1.0.1").await.unwrap();
    let record = world.governor.deploy(&staged.id, "ops").await.unwrap();
    world.ledger.fail(LedgerOp::Repoint);

    let err = world
        .governor
        .rollback(&staged.id, "transcripts garbled", "registrar")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RollbackFailed);

    let history = world.governor.rollback_history(&component()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].succeeded());
    assert_eq!(history[0].proposal_id, Some(staged.id));
    assert_eq!(
        history[0].replaced_implementation_ref,
        Some(record.new_implementation_ref.clone())
    );

    // The proposal stays deployed; the attempt is on its trail.
    assert_eq!(
        world.governor.get(&staged.id).await.unwrap().status,
        ProposalStatus::Deployed
    );
    let trail = world.governor.audit_trail(&staged.id).await.unwrap();
    let last = trail.last().unwrap();
    assert!(last.is_annotation());
    assert_eq!(last.to_status, ProposalStatus::Deployed);
    assert!(last.detail.contains("rollback attempt failed"), "{}", last.detail);
    world.governor.validate_lifecycle(&staged.id).await.unwrap();
    assert!(world.governor.verify_audit_chain().await.unwrap().is_intact());

    world.ledger.heal(LedgerOp::Repoint);
    let rollback = world
        .governor
        .rollback(&staged.id, "transcripts garbled", "registrar")
        .await
        .unwrap();
    assert!(rollback.succeeded());
    assert_eq!(world.governor.rollback_history(&component()).await.unwrap().len(), 2);
    assert_eq!(
        world.governor.get(&staged.id).await.unwrap().status,
        ProposalStatus::RolledBack
    );
    world.governor.validate_lifecycle(&staged.id).await.unwrap();
}

#[tokio::test]
async fn store_lost_mid_deployment_restores_pointer() {
    let world = World::builder()
        .analyzer(SemverCompatibilityAnalyzer::new())
        .migrations(SimulatedMigrationRunner::new(64).with_delay(Duration::from_millis(100)))
        .build()
        .unwrap();
    let staged = world.stage("1.4.0", "2.0.0").await.unwrap();

    let deploy = {
        let governor = world.governor.clone();
        let id = staged.id;
        tokio::spawn(async move { governor.deploy(&id, "ops").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    world.store.set_available(false);
    let err = deploy.await.unwrap().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Stranded);
    assert!(err.is_fatal());
    assert_eq!(world.ledger.live_ref(&component()), Some(genesis()));
    let alert = world
        .notifications
        .wait_for(Duration::from_secs(1), |n| {
            matches!(n, Notification::DeploymentStranded { .. })
        })
        .await
        .unwrap();
    assert_eq!(alert.proposal_id(), Some(staged.id));

    world.store.set_available(true);
    assert_eq!(
        world.governor.get(&staged.id).await.unwrap().status,
        ProposalStatus::Deploying
    );
    let reconciled = world
        .governor
        .reconcile_deployment(&staged.id, "oncall")
        .await
        .unwrap();
    assert_eq!(reconciled.status, ProposalStatus::Failed);
    world.governor.validate_lifecycle(&staged.id).await.unwrap();
}
