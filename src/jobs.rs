//! Job registry and orchestration
//!
//! One record per submitted search. `submit` validates the category
//! selection, parks a pending job in the registry, and spawns the pipeline as
//! an independent background task; callers discover the terminal state by
//! polling `get_status`. Terminal jobs are pruned after a retention window so
//! the table stays bounded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agents::planner::PlanningAgent;
use crate::bus::LogBroadcaster;
use crate::error::DealError;
use crate::feeds;
use crate::memory::DealMemory;
use crate::types::ResultRow;

/// Upper bound on categories per search.
pub const MAX_CATEGORIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Error => "error",
        }
    }
}

/// One search job. Results are non-empty only when completed; the error
/// message only when errored.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub categories: Vec<String>,
    pub results: Vec<ResultRow>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Compact job view for listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobState,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub total_results: usize,
}

/// Owns every in-flight and recently-finished job.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
    planner: Arc<PlanningAgent>,
    memory: Arc<DealMemory>,
    bus: Arc<LogBroadcaster>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(
        planner: Arc<PlanningAgent>,
        memory: Arc<DealMemory>,
        bus: Arc<LogBroadcaster>,
        retention: Duration,
    ) -> Arc<Self> {
        Arc::new(Self { jobs: RwLock::new(HashMap::new()), planner, memory, bus, retention })
    }

    /// Validate the selection, create a pending job, and start the pipeline
    /// in the background. Returns the job id immediately.
    pub async fn submit(self: &Arc<Self>, categories: Vec<String>) -> Result<String, DealError> {
        validate_categories(&categories)?;

        self.prune_terminal().await;

        let job = Job {
            id: Uuid::new_v4().to_string(),
            state: JobState::Pending,
            categories: categories.clone(),
            results: Vec::new(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        let job_id = job.id.clone();

        self.jobs.write().await.insert(job_id.clone(), job);

        let registry = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            registry.run_pipeline(id, categories).await;
        });

        Ok(job_id)
    }

    /// Snapshot of one job; safe against the pipeline's concurrent writes.
    pub async fn get_status(&self, job_id: &str) -> Result<Job, DealError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| DealError::NotFound(job_id.to_string()))
    }

    /// Summaries of every job still in the table, newest first.
    pub async fn list(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<JobSummary> = jobs
            .values()
            .map(|job| JobSummary {
                job_id: job.id.clone(),
                status: job.state,
                categories: job.categories.clone(),
                created_at: job.created_at,
                total_results: job.results.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Id of the most recently submitted job that is still running.
    pub async fn current_running(&self) -> Option<String> {
        let jobs = self.jobs.read().await;
        jobs.values()
            .filter(|job| job.state == JobState::Running)
            .max_by_key(|job| job.created_at)
            .map(|job| job.id.clone())
    }

    pub async fn running_count(&self) -> usize {
        let jobs = self.jobs.read().await;
        jobs.values().filter(|job| job.state == JobState::Running).count()
    }

    /// The background pipeline for one job. Always leaves the job in a
    /// terminal state; panics aside, no job silently disappears.
    async fn run_pipeline(self: Arc<Self>, job_id: String, categories: Vec<String>) {
        self.transition(&job_id, JobState::Running).await;
        self.bus.info(format!("Job {job_id} is running"));

        let seen = self.memory.seen_ids().await;

        match self.planner.plan(&categories, seen).await {
            Ok(opportunities) => {
                // Completed must mean durably recorded; a failed flush is a
                // job error even though evaluation succeeded.
                match self.memory.record_and_flush(&opportunities).await {
                    Ok(recorded) => {
                        let rows: Vec<ResultRow> =
                            opportunities.iter().map(|opp| opp.to_table_row()).collect();
                        self.bus.info(format!(
                            "Job {job_id} completed with {} deals ({recorded} newly remembered)",
                            rows.len()
                        ));
                        self.complete(&job_id, rows).await;
                    }
                    Err(err) => {
                        self.bus.error(format!("Job {job_id} could not persist results: {err}"));
                        self.fail(&job_id, err.to_string()).await;
                    }
                }
            }
            Err(err) => {
                self.bus.error(format!("Job {job_id} failed: {err}"));
                self.fail(&job_id, err.to_string()).await;
            }
        }
    }

    async fn transition(&self, job_id: &str, state: JobState) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.state = state;
        }
    }

    async fn complete(&self, job_id: &str, results: Vec<ResultRow>) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.state = JobState::Completed;
            job.results = results;
            job.finished_at = Some(Utc::now());
        }
    }

    async fn fail(&self, job_id: &str, message: String) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.state = JobState::Error;
            job.error = Some(message);
            job.finished_at = Some(Utc::now());
        }
    }

    /// Drop terminal jobs older than the retention window. Pending and
    /// running jobs are never touched.
    async fn prune_terminal(&self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        self.jobs.write().await.retain(|_, job| {
            !job.state.is_terminal() || job.finished_at.map(|at| at > cutoff).unwrap_or(true)
        });
    }
}

fn validate_categories(categories: &[String]) -> Result<(), DealError> {
    if categories.is_empty() {
        return Err(DealError::InvalidInput(
            "Please select at least one category before running.".into(),
        ));
    }
    if categories.len() > MAX_CATEGORIES {
        return Err(DealError::InvalidInput(format!(
            "You can select up to {MAX_CATEGORIES} categories only."
        )));
    }
    for category in categories {
        if !feeds::is_known_category(category) {
            return Err(DealError::InvalidInput(format!("Unknown category: {category}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_validation() {
        assert!(validate_categories(&["Electronics".into()]).is_ok());
        assert!(validate_categories(&[
            "Electronics".into(),
            "Computers".into(),
            "Automotive".into()
        ])
        .is_ok());

        assert!(matches!(validate_categories(&[]), Err(DealError::InvalidInput(_))));
        assert!(matches!(
            validate_categories(&[
                "Electronics".into(),
                "Computers".into(),
                "Automotive".into(),
                "Home & Garden".into()
            ]),
            Err(DealError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_categories(&["Spaceships".into()]),
            Err(DealError::InvalidInput(_))
        ));
    }

    #[test]
    fn job_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobState::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&JobState::Error).unwrap(), "\"error\"");
        assert!(JobState::Completed.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }
}
