//! Gradient-boosted predictor
//!
//! Client for the boosted-trees regressor service. Embedding computation and
//! the regression model live on the other side of the endpoint; the contract
//! here is the same JSON shape the specialist uses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::error::DealError;

use super::predictor::Predictor;

#[derive(Debug, Serialize)]
struct PriceRequest<'a> {
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

pub struct BoostPredictor {
    client: Client,
    url: String,
    call_timeout: Duration,
}

impl BoostPredictor {
    pub fn new(url: String, timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            url,
            call_timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn call(&self, description: &str) -> Result<f64, DealError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PriceRequest { description })
            .send()
            .await
            .map_err(DealError::prediction)?
            .error_for_status()
            .map_err(DealError::prediction)?;

        let parsed: PriceResponse = response.json().await.map_err(DealError::prediction)?;
        if !parsed.price.is_finite() {
            return Err(DealError::PredictionFailure("boost returned a non-finite price".into()));
        }
        // The regressor can undershoot into negative territory on sparse text
        Ok(parsed.price.max(0.0))
    }
}

#[async_trait]
impl Predictor for BoostPredictor {
    fn name(&self) -> &str {
        "Boost"
    }

    async fn estimate(&self, description: &str) -> Result<f64, DealError> {
        debug!("boost predictor starting");
        let price = timeout(self.call_timeout, self.call(description))
            .await
            .map_err(|_| DealError::PredictionFailure("boost call timed out".into()))??;
        debug!("boost predicted ${price:.2}");
        Ok(price)
    }
}
