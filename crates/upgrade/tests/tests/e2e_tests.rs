#[path = "e2e/voting_scenarios.rs"]
mod voting_scenarios;

#[path = "e2e/pipeline_to_staging.rs"]
mod pipeline_to_staging;

#[path = "e2e/deploy_and_rollback.rs"]
mod deploy_and_rollback;

#[path = "e2e/full_lifecycle.rs"]
mod full_lifecycle;
