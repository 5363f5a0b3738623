//! Deal scanner
//!
//! Fetches raw candidates from the category feeds, discards anything the
//! memory has already surfaced, and asks a text-selection model to narrow the
//! remainder to a small shortlist with unambiguous descriptions and explicit
//! prices.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::bus::LogBroadcaster;
use crate::error::DealError;
use crate::feeds;
use crate::types::{Deal, DealSelection, ScrapedDeal};

use super::llm::{ChatMessage, LlmClient};

/// Maximum deals the selection step may return.
pub const MAX_SHORTLIST: usize = 5;

const SELECTION_SYSTEM_PROMPT: &str = "You identify the most promising deals from a list. \
Select the deals with the clearest, most detailed product descriptions and an explicit price. \
Respond strictly in JSON with no explanation, in this format:\n\
{\"deals\": [{\"product_description\": \"Clear 4-sentence summary of the item itself, not the deal terms\", \"price\": 99.99, \"url\": \"the url\"}]}\n\
The price must be the actual price of the item, a plain number. \
Be careful with products described as \"$XXX off\" — that is not the price. \
Skip any deal whose price you are unsure about.";

/// The scan contract: categories plus the set of already-seen deal ids in,
/// price-bearing shortlist out. An empty shortlist is a normal outcome.
#[async_trait]
pub trait DealScanner: Send + Sync {
    async fn scan(
        &self,
        categories: &[String],
        seen: &HashSet<String>,
    ) -> Result<Vec<Deal>, DealError>;
}

/// Production scanner: RSS feeds + LLM text selection.
pub struct ScannerAgent {
    http: reqwest::Client,
    llm: LlmClient,
    selection_model: String,
    bus: Arc<LogBroadcaster>,
}

impl ScannerAgent {
    pub fn new(llm: LlmClient, selection_model: String, bus: Arc<LogBroadcaster>) -> Self {
        Self { http: reqwest::Client::new(), llm, selection_model, bus }
    }

    async fn fetch_candidates(
        &self,
        categories: &[String],
    ) -> Result<Vec<ScrapedDeal>, DealError> {
        let mut candidates = Vec::new();
        let mut failed_sources = 0usize;

        for category in categories {
            match feeds::fetch_category(&self.http, category).await {
                Ok(mut deals) => {
                    self.bus
                        .info(format!("Scanner fetched {} entries from '{category}'", deals.len()));
                    candidates.append(&mut deals);
                }
                Err(err) => {
                    failed_sources += 1;
                    self.bus.warning(format!("Scanner could not read '{category}': {err:#}"));
                }
            }
        }

        if failed_sources == categories.len() {
            return Err(DealError::ScanFailure("all feed sources failed".into()));
        }
        Ok(candidates)
    }

    async fn select(&self, candidates: &[ScrapedDeal]) -> Result<Vec<Deal>, DealError> {
        let listing = candidates
            .iter()
            .map(|deal| deal.describe())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let messages = vec![
            ChatMessage::system(SELECTION_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Select up to {MAX_SHORTLIST} of these deals:\n\n{listing}"
            )),
        ];

        let reply = self
            .llm
            .complete(&self.selection_model, messages, Some(2048))
            .await
            .map_err(|e| DealError::ScanFailure(format!("deal selection call failed: {e:#}")))?;

        let selection = parse_selection(&reply)
            .map_err(|e| DealError::ScanFailure(format!("deal selection reply unusable: {e}")))?;

        Ok(selection
            .deals
            .into_iter()
            .filter(|deal| deal.price > 0.0 && !deal.product_description.is_empty())
            .take(MAX_SHORTLIST)
            .collect())
    }
}

#[async_trait]
impl DealScanner for ScannerAgent {
    async fn scan(
        &self,
        categories: &[String],
        seen: &HashSet<String>,
    ) -> Result<Vec<Deal>, DealError> {
        let candidates = self.fetch_candidates(categories).await?;
        let fetched = candidates.len();

        let fresh: Vec<ScrapedDeal> =
            candidates.into_iter().filter(|deal| !seen.contains(&deal.id)).collect();
        self.bus.info(format!(
            "Scanner found {fetched} candidates, {} skipped as already seen",
            fetched - fresh.len()
        ));

        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let shortlist = self.select(&fresh).await?;
        debug!("selection returned {} deals", shortlist.len());

        // The model occasionally echoes a deal the memory already covers
        Ok(shortlist.into_iter().filter(|deal| !seen.contains(&deal.id())).collect())
    }
}

/// Parse the selection model's reply, tolerating markdown fences and prose
/// around the JSON document.
pub fn parse_selection(reply: &str) -> Result<DealSelection, serde_json::Error> {
    let trimmed = reply.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };
    serde_json::from_str(json)
}
