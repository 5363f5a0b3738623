//! End-to-end pipeline tests with injected collaborators
//!
//! Drives the job registry through the real planner with fake scanners and
//! predictors, a tempfile-backed memory, and no network.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use dealsense::agents::{DealScanner, EnsembleAgent, EnsembleWeights, PlanningAgent, Predictor};
use dealsense::bus::LogBroadcaster;
use dealsense::error::DealError;
use dealsense::jobs::{Job, JobRegistry, JobState};
use dealsense::memory::DealMemory;
use dealsense::types::Deal;

/// Scanner that serves a fixed set of deals, honoring the seen-id filter the
/// way the production scanner does.
struct StubScanner {
    deals: Vec<Deal>,
}

#[async_trait]
impl DealScanner for StubScanner {
    async fn scan(
        &self,
        _categories: &[String],
        seen: &HashSet<String>,
    ) -> Result<Vec<Deal>, DealError> {
        Ok(self.deals.iter().filter(|deal| !seen.contains(&deal.id())).cloned().collect())
    }
}

/// Scanner whose every source is down.
struct FailingScanner;

#[async_trait]
impl DealScanner for FailingScanner {
    async fn scan(
        &self,
        _categories: &[String],
        _seen: &HashSet<String>,
    ) -> Result<Vec<Deal>, DealError> {
        Err(DealError::ScanFailure("all feed sources failed".into()))
    }
}

struct StubPredictor {
    name: &'static str,
    value: Option<f64>,
}

#[async_trait]
impl Predictor for StubPredictor {
    fn name(&self) -> &str {
        self.name
    }

    async fn estimate(&self, _description: &str) -> Result<f64, DealError> {
        self.value
            .ok_or_else(|| DealError::PredictionFailure(format!("{} is unavailable", self.name)))
    }
}

fn predictor(name: &'static str, value: Option<f64>) -> Arc<dyn Predictor> {
    Arc::new(StubPredictor { name, value })
}

fn laptop_deal() -> Deal {
    Deal {
        product_description: "Used laptop, barely worn".into(),
        price: 200.0,
        url: "https://example.com/deals/u123".into(),
    }
}

async fn registry_with(
    scanner: Arc<dyn DealScanner>,
    predictors: Vec<Arc<dyn Predictor>>,
    dir: &tempfile::TempDir,
    retention: Duration,
) -> (Arc<JobRegistry>, Arc<DealMemory>, Arc<LogBroadcaster>) {
    let bus = Arc::new(LogBroadcaster::new());
    let memory = Arc::new(DealMemory::load(dir.path().join("memory.json")).await.unwrap());
    let planner = Arc::new(PlanningAgent::new(
        scanner,
        predictors,
        EnsembleAgent::new(EnsembleWeights::default()),
        0.2,
        bus.clone(),
    ));
    let registry = JobRegistry::new(planner, memory.clone(), bus.clone(), retention);
    (registry, memory, bus)
}

fn state_rank(state: JobState) -> u8 {
    match state {
        JobState::Pending => 0,
        JobState::Running => 1,
        JobState::Completed | JobState::Error => 2,
    }
}

/// Poll until terminal, asserting the state never regresses along the way.
async fn await_terminal(registry: &Arc<JobRegistry>, job_id: &str) -> Job {
    let mut last_rank = 0;
    for _ in 0..500 {
        let job = registry.get_status(job_id).await.expect("job should be queryable");
        let rank = state_rank(job.state);
        assert!(rank >= last_rank, "job state regressed");
        last_rank = rank;
        if job.state.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached a terminal state");
}

#[tokio::test]
async fn concrete_scenario_laptop_at_21_percent_discount() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, memory, _) = registry_with(
        Arc::new(StubScanner { deals: vec![laptop_deal()] }),
        vec![
            predictor("Specialist", Some(250.0)),
            predictor("Frontier", Some(260.0)),
            predictor("Boost", Some(255.0)),
        ],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;

    assert_eq!(job.state, JobState::Completed);
    assert!(job.error.is_none());
    assert_eq!(job.results.len(), 1);

    let row = &job.results[0];
    assert_eq!(row.0, "Used laptop, barely worn");
    assert_eq!(row.1, 200.0);
    assert_eq!(row.2, 255.0);
    assert_eq!(row.3, "21.6%");
    assert!(row.4.contains("https://example.com/deals/u123"));

    // Accepted deal was durably remembered
    assert_eq!(memory.accepted_count().await, 1);
    let accepted = memory.accepted().await;
    assert!(accepted[0].discount >= 0.2);
}

#[tokio::test]
async fn empty_selection_is_rejected_without_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, _) = registry_with(
        Arc::new(StubScanner { deals: vec![] }),
        vec![predictor("Specialist", Some(100.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let err = registry.submit(vec![]).await.unwrap_err();
    assert!(matches!(err, DealError::InvalidInput(_)));

    let err = registry
        .submit(vec![
            "Electronics".into(),
            "Computers".into(),
            "Automotive".into(),
            "Home & Garden".into(),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, DealError::InvalidInput(_)));

    let err = registry.submit(vec!["Spaceships".into()]).await.unwrap_err();
    assert!(matches!(err, DealError::InvalidInput(_)));

    // No job entered the registry
    assert!(registry.list().await.is_empty());
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, _) = registry_with(
        Arc::new(StubScanner { deals: vec![] }),
        vec![predictor("Specialist", Some(100.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let err = registry.get_status("no-such-job").await.unwrap_err();
    assert!(matches!(err, DealError::NotFound(_)));
}

#[tokio::test]
async fn second_run_finds_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, memory, _) = registry_with(
        Arc::new(StubScanner { deals: vec![laptop_deal()] }),
        vec![predictor("Specialist", Some(255.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let first = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &first).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.results.len(), 1);

    // Same feed, unchanged: the memory makes the rerun come up empty
    let second = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &second).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.results.len(), 0);

    assert_eq!(memory.accepted_count().await, 1);
}

#[tokio::test]
async fn scanner_total_failure_errors_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, _) = registry_with(
        Arc::new(FailingScanner),
        vec![predictor("Specialist", Some(100.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;

    assert_eq!(job.state, JobState::Error);
    assert!(job.results.is_empty());
    let message = job.error.expect("error jobs carry a message");
    assert!(message.contains("scan failed"));
}

#[tokio::test]
async fn one_predictor_down_still_completes_with_results() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, _) = registry_with(
        Arc::new(StubScanner { deals: vec![laptop_deal()] }),
        vec![
            predictor("Specialist", Some(250.0)),
            predictor("Frontier", None),
            predictor("Boost", Some(260.0)),
        ],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.results.len(), 1);
    // Ensemble over the two survivors
    assert_eq!(job.results[0].2, 255.0);
}

#[tokio::test]
async fn all_predictors_down_completes_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, memory, _) = registry_with(
        Arc::new(StubScanner { deals: vec![laptop_deal()] }),
        vec![predictor("Specialist", None), predictor("Frontier", None)],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;

    // The deal is dropped, the job is not an error
    assert_eq!(job.state, JobState::Completed);
    assert!(job.results.is_empty());
    assert!(job.error.is_none());
    assert_eq!(memory.accepted_count().await, 0);
}

#[tokio::test]
async fn discount_invariant_holds_for_every_result() {
    let dir = tempfile::tempdir().unwrap();
    let deals = vec![
        // 20%+ discount at estimate 250
        Deal { product_description: "good deal".into(), price: 190.0, url: "https://x.com/a".into() },
        // Under threshold
        Deal { product_description: "weak deal".into(), price: 240.0, url: "https://x.com/b".into() },
    ];
    let (registry, memory, _) = registry_with(
        Arc::new(StubScanner { deals }),
        vec![predictor("Specialist", Some(250.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.results.len(), 1);
    assert_eq!(job.results[0].0, "good deal");

    for opportunity in memory.accepted().await {
        assert!(opportunity.discount >= 0.2);
    }
}

#[tokio::test]
async fn failed_memory_flush_errors_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, _) = registry_with(
        Arc::new(StubScanner { deals: vec![laptop_deal()] }),
        vec![predictor("Specialist", Some(255.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    // Occupy the memory file location with a directory so the flush rename
    // cannot land
    tokio::fs::create_dir_all(dir.path().join("memory.json")).await.unwrap();

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;

    // Evaluation succeeded but the results could not be durably recorded
    assert_eq!(job.state, JobState::Error);
    assert!(job.results.is_empty());
    assert!(job.error.expect("error jobs carry a message").contains("persistence"));
}

#[tokio::test]
async fn job_log_events_arrive_in_causal_order() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, bus) = registry_with(
        Arc::new(StubScanner { deals: vec![laptop_deal()] }),
        vec![predictor("Specialist", Some(255.0))],
        &dir,
        Duration::from_secs(3600),
    )
    .await;

    let (_, mut rx) = bus.subscribe();

    let job_id = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &job_id).await;
    assert_eq!(job.state, JobState::Completed);

    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        messages.push(event.message);
    }

    let running_at = messages
        .iter()
        .position(|m| m.contains(&format!("Job {job_id} is running")))
        .expect("running event emitted");
    let completed_at = messages
        .iter()
        .position(|m| m.contains(&format!("Job {job_id} completed")))
        .expect("completed event emitted");
    assert!(running_at < completed_at);
}

#[tokio::test]
async fn terminal_jobs_are_pruned_after_retention() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _, _) = registry_with(
        Arc::new(StubScanner { deals: vec![] }),
        vec![predictor("Specialist", Some(100.0))],
        &dir,
        Duration::ZERO,
    )
    .await;

    let first = registry.submit(vec!["Electronics".into()]).await.unwrap();
    let job = await_terminal(&registry, &first).await;
    assert_eq!(job.state, JobState::Completed);

    // The next submit sweeps expired terminal jobs out of the table
    let second = registry.submit(vec!["Electronics".into()]).await.unwrap();
    assert!(matches!(registry.get_status(&first).await, Err(DealError::NotFound(_))));
    let job = await_terminal(&registry, &second).await;
    assert!(job.state.is_terminal());
}
