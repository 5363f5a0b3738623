//! Frontier predictor
//!
//! Retrieval-augmented pricing via the chat-completions API. The retrieval
//! index is maintained by the serving side; this client asks the model for a
//! price and parses the first dollar amount out of the reply.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::timeout;
use tracing::debug;

use crate::error::DealError;

use super::llm::{ChatMessage, LlmClient};
use super::predictor::Predictor;

const SYSTEM_PROMPT: &str = "You estimate prices of items. Given the description of an item, \
reply only with the price in dollars, no explanation.";

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("price regex"));

/// Pull the first numeric amount out of a model reply like "$254.09" or
/// "Price is $254.09, give or take".
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned = text.replace('$', "").replace(',', "");
    PRICE_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub struct FrontierPredictor {
    client: LlmClient,
    model: String,
    call_timeout: Duration,
}

impl FrontierPredictor {
    pub fn new(client: LlmClient, model: String, timeout_secs: u64) -> Self {
        Self { client, model, call_timeout: Duration::from_secs(timeout_secs) }
    }

    async fn call(&self, description: &str) -> Result<f64, DealError> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "How much does this cost?\n\n{description}\n\nPrice is $"
            )),
        ];

        let reply = self
            .client
            .complete(&self.model, messages, Some(16))
            .await
            .map_err(DealError::prediction)?;

        parse_price(&reply).ok_or_else(|| {
            DealError::PredictionFailure(format!("frontier reply had no price: {reply:?}"))
        })
    }
}

#[async_trait]
impl Predictor for FrontierPredictor {
    fn name(&self) -> &str {
        "Frontier"
    }

    async fn estimate(&self, description: &str) -> Result<f64, DealError> {
        debug!("frontier predictor starting");
        let price = timeout(self.call_timeout, self.call(description))
            .await
            .map_err(|_| DealError::PredictionFailure("frontier call timed out".into()))??;
        debug!("frontier predicted ${price:.2}");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_decorated_prices() {
        assert_eq!(parse_price("254.09"), Some(254.09));
        assert_eq!(parse_price("$1,250.00"), Some(1250.0));
        assert_eq!(parse_price("The price is $89 for this item"), Some(89.0));
        assert_eq!(parse_price("no digits here"), None);
    }
}
