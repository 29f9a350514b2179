#![deny(unsafe_code)]
//! Upgrade governance demo binary.
//!
//! Walks a student registry component through the governed upgrade
//! lifecycle:
//! 1. Weighted vote that approves over a dissent
//! 2. Weighted vote that rejects
//! 3. A late vote refused after the deadline
//! 4. Gated test pipeline with the migration stage skipped
//! 5. Deployment, then a failed migration with automatic rollback
//!
//! Pass a TOML config path as the first argument to override defaults.
//! No external services are needed; every collaborator is simulated.

mod campus;

use anyhow::Context;
use upgrade_deploy::SimulatedMigrationRunner;
use upgrade_governor::{telemetry, GovernorConfig};
use upgrade_types::{ProposalStatus, StageStatus, VoteDecision};

use campus::{Campus, ADMIN, AUDITOR, STUDENT};

// ── Formatting Helpers ──────────────────────────────────────────────────

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║            Governed Component Upgrades  --  Demo              ║
 ║                                                               ║
 ║   Weighted voting, gated test pipeline, locked deployment     ║
 ║   and automatic rollback over a hash-chained audit trail.     ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

fn section(title: &str) {
    let width: usize = 60;
    let pad = width.saturating_sub(title.len() + 4);
    let left = pad / 2;
    let right = pad - left;
    println!();
    println!(" ┌{}┐", "─".repeat(width));
    println!(" │{}  {}  {}│", " ".repeat(left), title, " ".repeat(right));
    println!(" └{}┘", "─".repeat(width));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match GovernorConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("   [FATAL]  {}", e);
                std::process::exit(2);
            }
        },
        None => {
            let mut config = GovernorConfig::default();
            config.governor.log_filter = "warn".into();
            config
        }
    };
    telemetry::init_tracing(&config.governor.log_filter);

    println!("{}", BANNER);

    if let Err(e) = run_demo(config).await {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {:#}", e);
        std::process::exit(1);
    }

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.  All scenarios behaved as expected.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
}

async fn run_demo(mut config: GovernorConfig) -> anyhow::Result<()> {
    // The demo drives each pipeline run itself.
    config.governor.auto_run_pipeline = false;
    let campus = Campus::new(config.clone(), SimulatedMigrationRunner::new(18_240))?;

    info(&format!(
        "quorum={}  threshold={:.2}  roles={}",
        config.voting.quorum,
        config.voting.approval_threshold,
        config.voting.role_weights.len()
    ));

    // ── Scenario A: approval over a dissent ─────────────────────────
    section("Scenario A: Weighted Approval");

    let a = campus
        .propose("1.4.0", "1.4.1", "fix transcript rounding")
        .await?;
    ok(&format!("proposal {}  status={}", a.id, a.status));

    let receipt = campus
        .vote(&a.id, STUDENT, VoteDecision::Reject, "rounding change affects GPA")
        .await?;
    info(&format!("{} rejects   {}", STUDENT.0, receipt.tally));
    let receipt = campus
        .vote(&a.id, ADMIN, VoteDecision::Approve, "reviewed with registrar")
        .await?;
    info(&format!("{} approves  {}", ADMIN.0, receipt.tally));
    let receipt = campus
        .vote(&a.id, AUDITOR, VoteDecision::Approve, "no ledger impact")
        .await?;
    info(&format!("{} approves  {}", AUDITOR.0, receipt.tally));
    anyhow::ensure!(
        receipt.status == ProposalStatus::Testing,
        "expected testing, got {}",
        receipt.status
    );
    ok(&format!("decided: {}  -> {}", receipt.tally.outcome, receipt.status));

    // ── Scenario B: rejection ───────────────────────────────────────
    section("Scenario B: Weighted Rejection");

    let b = campus
        .propose("1.4.0", "1.5.0", "add bulk enrolment import")
        .await?;
    campus
        .vote(&b.id, ADMIN, VoteDecision::Reject, "import bypasses approvals")
        .await?;
    let receipt = campus
        .vote(&b.id, AUDITOR, VoteDecision::Approve, "format is sound")
        .await?;
    info(&receipt.tally.to_string());
    anyhow::ensure!(receipt.status == ProposalStatus::Rejected, "expected rejection");
    ok(&format!("decided: {}", receipt.status));

    // ── Scenario C: late vote ───────────────────────────────────────
    section("Scenario C: Voting Deadline");

    let c = campus
        .propose("1.4.0", "1.4.2", "tighten password policy")
        .await?;
    let before = campus
        .vote(&c.id, ADMIN, VoteDecision::Approve, "overdue")
        .await?
        .tally;
    info(&format!("before deadline  {}", before));

    campus.clock.set(c.voting_deadline + chrono::Duration::seconds(1));
    match campus
        .vote(&c.id, AUDITOR, VoteDecision::Approve, "sorry, late")
        .await
    {
        Ok(_) => anyhow::bail!("late vote was accepted"),
        Err(e) => warn(&format!("late vote refused: {}", e)),
    }
    let after = campus.governor.tally(&c.id).await?;
    anyhow::ensure!(after == before, "late vote changed the tally");
    ok("tally unchanged by the late vote");

    for (id, status) in campus.governor.close_expired_voting().await? {
        ok(&format!("closed {}  -> {}", id, status));
    }

    // ── Scenario D: pipeline to staging ─────────────────────────────
    section("Scenario D: Gated Test Pipeline");

    let report = campus.governor.run_pipeline(&a.id).await?;
    for result in &report.results {
        let metrics = result
            .metrics
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        let line = format!("{:<24} {:?}  {}", result.stage.to_string(), result.status, metrics);
        if result.status == StageStatus::Skipped {
            info(&line);
        } else {
            ok(&line);
        }
    }
    let staged = campus.governor.get(&a.id).await?;
    anyhow::ensure!(staged.status == ProposalStatus::Staged, "pipeline did not stage");
    ok(&format!("verdict {:?}  -> {}", report.verdict, staged.status));

    let record = campus.governor.deploy(&a.id, "release-manager").await?;
    ok(&format!(
        "deployed {} -> {}",
        record.previous_implementation_ref, record.new_implementation_ref
    ));

    // ── Scenario E: failed migration ────────────────────────────────
    section("Scenario E: Migration Failure and Rollback");

    let failing = Campus::new(
        config,
        SimulatedMigrationRunner::failing("enrolment_date column missing in shard 3"),
    )?;
    let e = failing
        .propose("1.4.1", "2.0.0", "split enrolment into its own store")
        .await?;
    let report = e
        .compatibility_report
        .as_ref()
        .context("compatibility report missing")?;
    info(&format!(
        "risk={}  migration_required={}",
        report.risk_level, report.migration_required
    ));
    failing.vote(&e.id, ADMIN, VoteDecision::Approve, "planned outage").await?;
    failing.vote(&e.id, AUDITOR, VoteDecision::Approve, "backup taken").await?;
    failing.governor.run_pipeline(&e.id).await?;

    match failing.governor.deploy(&e.id, "release-manager").await {
        Ok(_) => anyhow::bail!("deployment should have failed"),
        Err(err) => warn(&format!("{}", err)),
    }
    let live = failing.ledger.live_ref(&failing.component());
    ok(&format!(
        "live ref restored: {}",
        live.map(|r| r.to_string()).unwrap_or_else(|| "<none>".into())
    ));
    for rollback in failing.governor.rollback_history(&failing.component()).await? {
        info(&format!(
            "rollback {:?}  reason={}  {} -> {}",
            rollback.trigger,
            rollback.reason,
            rollback
                .replaced_implementation_ref
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "<unread>".into()),
            rollback.restored_implementation_ref
        ));
    }
    let failed = failing.governor.get(&e.id).await?;
    anyhow::ensure!(failed.status == ProposalStatus::Failed, "expected failed");
    ok(&format!("proposal {}  status={}", failed.id, failed.status));

    // ── Summary ─────────────────────────────────────────────────────
    section("Audit Summary");

    for (label, governor) in [("main", &campus.governor), ("failing", &failing.governor)] {
        let chain = governor.verify_audit_chain().await?;
        anyhow::ensure!(chain.is_intact(), "audit chain broken: {:?}", chain.error_message);
        ok(&format!(
            "{label}: {} entries verified",
            chain.verified_entries
        ));
        info(&governor.summary().await?.to_string());
    }
    for entry in campus.governor.audit_trail(&a.id).await? {
        info(&format!(
            "#{:<3} {:>10} -> {:<10} by {:<16} {}",
            entry.seq,
            entry.from_status.map(|s| s.to_string()).unwrap_or_default(),
            entry.to_status,
            entry.actor,
            entry.detail
        ));
    }

    Ok(())
}
