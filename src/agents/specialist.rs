//! Specialist predictor
//!
//! Client for the fine-tuned pricing model served behind a JSON inference
//! endpoint. The model itself is an external artifact; this side only speaks
//! the wire contract: `POST { "description" } -> { "price" }`.

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

pub struct SpecialistPredictor {
    client: Client,
    url: String,
    call_timeout: Duration,
}

impl SpecialistPredictor {
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
        if !parsed.price.is_finite() || parsed.price < 0.0 {
            return Err(DealError::PredictionFailure(format!(
                "specialist returned unusable price {}",
                parsed.price
            )));
        }
        Ok(parsed.price)
    }
}

#[async_trait]
impl Predictor for SpecialistPredictor {
    fn name(&self) -> &str {
        "Specialist"
    }

    async fn estimate(&self, description: &str) -> Result<f64, DealError> {
        debug!("specialist predictor starting");
        let price = timeout(self.call_timeout, self.call(description))
            .await
            .map_err(|_| DealError::PredictionFailure("specialist call timed out".into()))??;
        debug!("specialist predicted ${price:.2}");
        Ok(price)
    }
}
