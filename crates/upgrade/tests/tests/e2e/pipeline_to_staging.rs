//! E2E: approved proposals run the gated test pipeline.

use std::time::Duration;

use upgrade_compat::SemverCompatibilityAnalyzer;
use upgrade_pipeline::{PipelineVerdict, SimulatedStageExecutor};
use upgrade_tests::*;
use upgrade_types::{ProposalStatus, StageOutcome, StageStatus, TestStage};

#[tokio::test]
async fn migration_stage_skipped_when_not_required() {
    let world = World::builder().build().unwrap();
    let staged = world.stage("1.0.0", "1.0.1").await.unwrap();

    assert_eq!(staged.status, ProposalStatus::Staged);
    assert!(!staged.migration_required());

    let results = staged.test_results.as_ref().unwrap();
    let migration = results
        .iter()
        .find(|r| r.stage == TestStage::MigrationTest)
        .unwrap();
    assert_eq!(migration.status, StageStatus::Skipped);
    assert!(!world.executor.was_invoked(TestStage::MigrationTest));
    assert!(staged.tests_passed());
}

#[tokio::test]
async fn breaking_change_runs_migration_stage() {
    let world = World::builder()
        .analyzer(SemverCompatibilityAnalyzer::new())
        .build()
        .unwrap();
    let staged = world.stage("1.4.0", "2.0.0").await.unwrap();

    assert!(staged.migration_required());
    assert!(world.executor.was_invoked(TestStage::MigrationTest));
    let results = staged.test_results.unwrap();
    assert!(results.iter().all(|r| r.status == StageStatus::Passed));
}

#[tokio::test]
async fn stages_run_in_plan_order() {
    let world = World::builder().build().unwrap();
    world.stage("1.0.0", "1.0.1").await.unwrap();

    let calls = world.executor.invocations();
    assert_eq!(calls[0], TestStage::Compilation);
    assert_eq!(calls[1], TestStage::SandboxDeployment);
    assert_eq!(calls[2], TestStage::BackwardCompatibility);
    assert_eq!(calls.len(), 5);
}

#[tokio::test]
async fn failing_required_stage_stops_pipeline() {
    let world = World::builder()
        .executor(
            SimulatedStageExecutor::all_pass()
                .with_failure(TestStage::BackwardCompatibility, "ABI mismatch on enroll()"),
        )
        .build()
        .unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.approve(&p.id).await.unwrap();
    let report = world.governor.run_pipeline(&p.id).await.unwrap();

    assert_eq!(
        report.verdict,
        PipelineVerdict::Failed {
            stage: TestStage::BackwardCompatibility,
            error: "ABI mismatch on enroll()".into(),
        }
    );
    assert!(!world.executor.was_invoked(TestStage::PerformanceBenchmark));
    assert!(!world.executor.was_invoked(TestStage::SecurityAudit));

    let failed = world.governor.get(&p.id).await.unwrap();
    assert_eq!(failed.status, ProposalStatus::Failed);
    assert_eq!(failed.test_results.unwrap().len(), 4, "results so far are kept");

    let err = world.governor.deploy(&p.id, "ops").await.unwrap_err();
    assert!(err.to_string().contains("failed"), "{err}");
}

#[tokio::test]
async fn failure_in_parallel_group_keeps_both_results() {
    let world = World::builder()
        .executor(SimulatedStageExecutor::all_pass().with_failure(TestStage::SecurityAudit, "CVE found"))
        .build()
        .unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.approve(&p.id).await.unwrap();
    let report = world.governor.run_pipeline(&p.id).await.unwrap();

    assert_eq!(
        report.result_for(TestStage::PerformanceBenchmark).unwrap().status,
        StageStatus::Passed
    );
    assert_eq!(
        report.result_for(TestStage::SecurityAudit).unwrap().status,
        StageStatus::Failed
    );
    assert_eq!(world.governor.get(&p.id).await.unwrap().status, ProposalStatus::Failed);
}

#[tokio::test]
async fn advisory_stage_does_not_gate() {
    let world = World::builder()
        .config(|c| {
            c.pipeline.advisory_stages.insert(TestStage::PerformanceBenchmark);
        })
        .executor(SimulatedStageExecutor::all_pass().with_outcome(
            TestStage::PerformanceBenchmark,
            StageOutcome::failed("p99 regressed").with_metric("p99_ms", 840.0),
        ))
        .build()
        .unwrap();
    let staged = world.stage("1.0.0", "1.1.0").await.unwrap();

    assert_eq!(staged.status, ProposalStatus::Staged);
    let bench = staged
        .test_results
        .unwrap()
        .into_iter()
        .find(|r| r.stage == TestStage::PerformanceBenchmark)
        .unwrap();
    assert_eq!(bench.status, StageStatus::Failed);
    assert!(!bench.required);
}

#[tokio::test]
async fn stage_timeout_counts_as_failure() {
    let world = World::builder()
        .config(|c| c.pipeline.stage_timeout_ms = 50)
        .executor(SimulatedStageExecutor::all_pass().with_delay(TestStage::Compilation, Duration::from_secs(5)))
        .build()
        .unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.approve(&p.id).await.unwrap();
    let report = world.governor.run_pipeline(&p.id).await.unwrap();

    assert_eq!(
        report.result_for(TestStage::Compilation).unwrap().status,
        StageStatus::TimedOut
    );
    assert_eq!(world.governor.get(&p.id).await.unwrap().status, ProposalStatus::Failed);
}

#[tokio::test]
async fn approval_starts_background_pipeline() {
    let world = World::builder().auto_run_pipeline().build().unwrap();
    let p = world.propose("1.0.0", "1.1.0").await.unwrap();
    world.approve(&p.id).await.unwrap();

    if let Some(report) = world.governor.await_pipeline(&p.id).await.unwrap() {
        assert!(report.passed());
    }
    let staged = world.governor.get(&p.id).await.unwrap();
    assert_eq!(staged.status, ProposalStatus::Staged);
    assert!(staged.tests_passed());
}

#[tokio::test]
async fn finished_background_pipelines_are_released() {
    let world = World::builder().auto_run_pipeline().build().unwrap();
    let mut ids = Vec::new();
    for patch in 1..=5 {
        let p = world.propose("1.0.0", &format!("1.0.{patch}")).await.unwrap();
        world.approve(&p.id).await.unwrap();
        ids.push(p.id);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let mut all_staged = true;
        for id in &ids {
            all_staged &= world.governor.get(id).await.unwrap().status == ProposalStatus::Staged;
        }
        if all_staged && world.governor.running_pipelines() == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} pipelines still held",
            world.governor.running_pipelines()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for id in &ids {
        assert!(world.governor.await_pipeline(id).await.unwrap().is_none());
    }
}
