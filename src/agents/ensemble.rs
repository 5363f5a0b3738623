//! Ensemble combiner
//!
//! Folds the successful predictor estimates for one deal into a single price
//! using engineered features and a fixed trained linear model. The weights
//! are a versioned artifact produced by an external training pipeline; the
//! combiner itself is pure and deterministic for a fixed weight set.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::DealError;

/// Linear model coefficients over the engineered features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleWeights {
    /// Artifact version, bumped by the training pipeline
    pub version: u32,
    pub intercept: f64,
    /// Coefficient on the number of successful predictions
    pub count: f64,
    pub mean: f64,
    pub max: f64,
    /// Coefficient on max - min
    pub spread: f64,
}

impl Default for EnsembleWeights {
    /// Mean-identity weights: the estimate is the plain mean of the
    /// predictions. Sensible behavior before a trained artifact exists.
    fn default() -> Self {
        Self { version: 0, intercept: 0.0, count: 0.0, mean: 1.0, max: 0.0, spread: 0.0 }
    }
}

impl EnsembleWeights {
    /// Load a trained artifact from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading ensemble weights from {}", path.display()))?;
        serde_json::from_str(&contents).context("parsing ensemble weights artifact")
    }

    /// Load from an optional configured path, defaulting when absent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// The combiner. Construction fixes the weight set for the process lifetime.
pub struct EnsembleAgent {
    weights: EnsembleWeights,
}

impl EnsembleAgent {
    pub fn new(weights: EnsembleWeights) -> Self {
        Self { weights }
    }

    pub fn version(&self) -> u32 {
        self.weights.version
    }

    /// Combine one deal's successful estimates into the final price.
    ///
    /// Fails with `EnsembleFailure` when no predictor produced an estimate;
    /// the caller drops that deal rather than fabricating a price.
    pub fn price(&self, estimates: &[f64]) -> Result<f64, DealError> {
        if estimates.is_empty() {
            return Err(DealError::EnsembleFailure);
        }

        let count = estimates.len() as f64;
        let mean = estimates.iter().sum::<f64>() / count;
        let max = estimates.iter().cloned().fold(f64::MIN, f64::max);
        let min = estimates.iter().cloned().fold(f64::MAX, f64::min);
        let spread = max - min;

        let w = &self.weights;
        let estimate = w.intercept + w.count * count + w.mean * mean + w.max * max + w.spread * spread;
        Ok(estimate.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_return_the_mean() {
        let agent = EnsembleAgent::new(EnsembleWeights::default());
        let price = agent.price(&[250.0, 260.0, 255.0]).unwrap();
        assert!((price - 255.0).abs() < 1e-9);
    }

    #[test]
    fn single_estimate_passes_through() {
        let agent = EnsembleAgent::new(EnsembleWeights::default());
        assert_eq!(agent.price(&[120.0]).unwrap(), 120.0);
    }

    #[test]
    fn empty_input_is_an_ensemble_failure() {
        let agent = EnsembleAgent::new(EnsembleWeights::default());
        assert!(matches!(agent.price(&[]), Err(DealError::EnsembleFailure)));
    }

    #[test]
    fn trained_weights_apply_linearly() {
        let agent = EnsembleAgent::new(EnsembleWeights {
            version: 3,
            intercept: 10.0,
            count: 1.0,
            mean: 0.5,
            max: 0.25,
            spread: -1.0,
        });
        // count=2, mean=150, max=200, spread=100
        let price = agent.price(&[100.0, 200.0]).unwrap();
        assert!((price - (10.0 + 2.0 + 75.0 + 50.0 - 100.0)).abs() < 1e-9);
    }

    #[test]
    fn negative_output_clamps_to_zero() {
        let agent = EnsembleAgent::new(EnsembleWeights {
            version: 1,
            intercept: -1000.0,
            count: 0.0,
            mean: 1.0,
            max: 0.0,
            spread: 0.0,
        });
        assert_eq!(agent.price(&[50.0]).unwrap(), 0.0);
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let weights = EnsembleWeights { version: 7, intercept: 1.5, count: 0.1, mean: 0.8, max: 0.1, spread: -0.2 };
        let json = serde_json::to_string(&weights).unwrap();
        let parsed: EnsembleWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, 7);
        assert_eq!(parsed.mean, 0.8);
    }
}
