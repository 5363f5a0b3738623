//! HTTP handlers for the deal search API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::DealError;
use crate::feeds;
use crate::jobs::JobState;
use crate::types::ResultRow;

use super::AppState;

/// Search request: 1 to 3 known category names.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub selected_categories: Vec<String>,
}

/// Search accepted: the id to poll.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub job_id: String,
    pub status: JobState,
}

/// Poll response: state plus the fixed 5-tuple result rows.
#[derive(Debug, Serialize)]
pub struct SearchResultsResponse {
    pub status: JobState,
    pub results: Vec<ResultRow>,
    pub error_message: String,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct AppStatus {
    pub is_running: bool,
    pub current_job_id: Option<String>,
    pub total_deals_found: usize,
    pub categories_available: Vec<String>,
}

/// Kick off a deal search in the background.
pub async fn search_handler(
    State(state): State<AppState>,
    Json(req): Json<CategoryRequest>,
) -> impl IntoResponse {
    match state.registry.submit(req.selected_categories).await {
        Ok(job_id) => (
            StatusCode::OK,
            Json(SearchResponse { job_id, status: JobState::Pending }),
        )
            .into_response(),
        Err(DealError::InvalidInput(detail)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": err.to_string() })),
        )
            .into_response(),
    }
}

/// Poll a job's state and results.
pub async fn results_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_status(&job_id).await {
        Ok(job) => {
            let total_count = job.results.len();
            (
                StatusCode::OK,
                Json(SearchResultsResponse {
                    status: job.state,
                    results: job.results,
                    error_message: job.error.unwrap_or_default(),
                    total_count,
                }),
            )
                .into_response()
        }
        Err(DealError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "detail": "Job not found" }))).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": err.to_string() })),
        )
            .into_response(),
    }
}

/// Static category catalog.
pub async fn categories_handler() -> impl IntoResponse {
    let categories: Vec<CategoryInfo> = feeds::CATEGORY_FEEDS
        .iter()
        .map(|(name, _)| CategoryInfo {
            name: (*name).to_string(),
            display_name: feeds::display_name(name),
        })
        .collect();
    Json(json!({ "categories": categories }))
}

/// All jobs still in the registry, newest first.
pub async fn jobs_handler(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.registry.list().await;
    Json(json!({ "jobs": jobs }))
}

/// Application status for dashboards.
pub async fn app_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let running = state.registry.running_count().await;
    let status = AppStatus {
        is_running: running > 0,
        current_job_id: state.registry.current_running().await,
        total_deals_found: state.memory.accepted_count().await,
        categories_available: feeds::CATEGORY_FEEDS.iter().map(|(name, _)| (*name).to_string()).collect(),
    };
    Json(status)
}

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "DealSense backend is running" }))
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "memory_count": state.memory.accepted_count().await,
        "observers": state.bus.observer_count(),
    }))
}
