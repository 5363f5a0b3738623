//! Error taxonomy for the deal pipeline
//!
//! Components return `DealError` at the seams; the CLI and server map it to
//! exit codes / HTTP statuses. `anyhow` is used at the application boundary.

use thiserror::Error;

/// Errors produced by the scan/predict/persist pipeline and its front doors.
#[derive(Debug, Error)]
pub enum DealError {
    /// Bad category selection — rejected before a job is created.
    #[error("{0}")]
    InvalidInput(String),

    /// Status query for an unknown job id.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Every configured feed source failed to fetch or parse.
    #[error("deal scan failed: {0}")]
    ScanFailure(String),

    /// One predictor's call failed (timeout, transport, malformed reply).
    /// Recovered locally; never fails the job by itself.
    #[error("prediction failed: {0}")]
    PredictionFailure(String),

    /// No predictor produced a usable estimate for a deal.
    #[error("no usable price estimate")]
    EnsembleFailure,

    /// Memory flush failed — the job must not report completed.
    #[error("memory persistence failed: {0}")]
    Persistence(String),
}

impl DealError {
    /// Predictor failure from any underlying error.
    pub fn prediction(err: impl std::fmt::Display) -> Self {
        Self::PredictionFailure(err.to_string())
    }
}
