#[path = "adversarial/concurrent_deploys.rs"]
mod concurrent_deploys;

#[path = "adversarial/transition_races.rs"]
mod transition_races;

#[path = "adversarial/tampered_audit.rs"]
mod tampered_audit;

#[path = "adversarial/collaborator_faults.rs"]
mod collaborator_faults;
