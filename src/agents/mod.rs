//! Deal evaluation agents
//!
//! The scanner finds and shortlists candidates, three independent predictors
//! price them, the ensemble combines the estimates, and the planner ties the
//! workflow together for one run.

pub mod boost;
pub mod ensemble;
pub mod frontier;
pub mod llm;
pub mod planner;
pub mod predictor;
pub mod scanner;
pub mod specialist;

use std::sync::Arc;

use anyhow::Result;

use crate::bus::LogBroadcaster;
use crate::config::Config;

pub use ensemble::{EnsembleAgent, EnsembleWeights};
pub use planner::PlanningAgent;
pub use predictor::Predictor;
pub use scanner::{DealScanner, ScannerAgent};

/// Wire the production planner from configuration: RSS/LLM scanner, the three
/// remote predictors, and the configured ensemble weights.
pub fn build_planner(config: &Config, bus: Arc<LogBroadcaster>) -> Result<PlanningAgent> {
    let llm = llm::LlmClient::from_config(&config.llm)?;

    let scanner = Arc::new(ScannerAgent::new(
        llm.clone(),
        config.llm.selection_model.clone(),
        bus.clone(),
    ));

    let predictors: Vec<Arc<dyn Predictor>> = vec![
        Arc::new(specialist::SpecialistPredictor::new(
            config.predictors.specialist_url.clone(),
            config.predictors.timeout_secs,
        )),
        Arc::new(frontier::FrontierPredictor::new(
            llm,
            config.llm.frontier_model.clone(),
            config.predictors.timeout_secs,
        )),
        Arc::new(boost::BoostPredictor::new(
            config.predictors.boost_url.clone(),
            config.predictors.timeout_secs,
        )),
    ];

    let weights = EnsembleWeights::load_or_default(config.ensemble.weights_path.as_deref())?;

    Ok(PlanningAgent::new(
        scanner,
        predictors,
        EnsembleAgent::new(weights),
        config.ensemble.threshold,
        bus,
    ))
}
