//! Predictor capability contract
//!
//! Every price-estimation collaborator implements one operation: description
//! in, price estimate out. Implementations are black boxes behind this trait;
//! the planner collects whichever subset succeeds per deal.

use async_trait::async_trait;

use crate::error::DealError;

/// A black-box price estimator. Implementations must enforce their own call
/// timeout so one unresponsive collaborator cannot stall a job.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &str;

    /// Estimate a fair price for the described product.
    async fn estimate(&self, description: &str) -> Result<f64, DealError>;
}

/// One predictor's outcome for one deal.
#[derive(Debug)]
pub struct Prediction {
    pub predictor: String,
    pub result: Result<f64, DealError>,
}
