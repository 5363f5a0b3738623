//! Web server module
//!
//! Exposes the job pipeline over HTTP (submit, poll, catalog, app status) and
//! streams live log events over a WebSocket. The handlers never block on a
//! running job.

pub mod http;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agents;
use crate::bus::LogBroadcaster;
use crate::config::Config;
use crate::jobs::JobRegistry;
use crate::memory::DealMemory;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub memory: Arc<DealMemory>,
    pub bus: Arc<LogBroadcaster>,
}

/// Build the application router over prepared state.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(http::root_handler))
        .route("/health", get(http::health_handler))
        .route("/api/search", post(http::search_handler))
        .route("/api/results/{job_id}", get(http::results_handler))
        .route("/api/categories", get(http::categories_handler))
        .route("/api/jobs", get(http::jobs_handler))
        .route("/api/status", get(http::app_status_handler))
        .route("/ws/logs", get(ws::logs_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(host: &str, port: u16, config: Config) -> Result<()> {
    let bus = Arc::new(LogBroadcaster::new());

    let planner = Arc::new(agents::build_planner(&config, bus.clone())?);

    let memory_path = config.memory.resolve_path()?;
    let memory = Arc::new(DealMemory::load(memory_path.clone()).await?);

    let registry = JobRegistry::new(
        planner,
        memory.clone(),
        bus.clone(),
        Duration::from_secs(config.jobs.retention_secs),
    );

    let state = AppState { registry, memory, bus };
    let app = build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse().context("invalid listen address")?;

    info!("memory at {}", memory_path.display());
    println!("DealSense server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
