//! Shared types used across modules
//!
//! Deal, selection, and opportunity types plus the log event shape
//! streamed to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A raw candidate pulled from an RSS feed, before selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedDeal {
    /// Category the feed belongs to
    pub category: String,
    pub title: String,
    /// Cleaned text of the feed entry's HTML snippet
    pub summary: String,
    pub url: String,
    /// Stable identifier derived from the url, used for dedup across runs
    pub id: String,
}

impl ScrapedDeal {
    /// Longer description used when calling the selection/prediction models.
    pub fn describe(&self) -> String {
        format!("Title: {}\nDetails: {}\nURL: {}", self.title, self.summary, self.url)
    }
}

/// Stable identifier for a deal: truncated hex SHA-256 of its link.
pub fn stable_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// A deal that passed text selection: clear description, explicit price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub product_description: String,
    pub price: f64,
    pub url: String,
}

impl Deal {
    pub fn id(&self) -> String {
        stable_id(&self.url)
    }
}

/// The selection model's reply: a handful of clearly-priced deals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealSelection {
    pub deals: Vec<Deal>,
}

/// A deal we estimate should cost more than it is offered for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub deal: Deal,
    /// Final ensemble price estimate
    pub estimate: f64,
    /// Discount ratio: (estimate - price) / estimate
    pub discount: f64,
}

impl Opportunity {
    /// Render the fixed 5-tuple row served to clients:
    /// description, listed price, estimate, discount percentage, link markup.
    pub fn to_table_row(&self) -> ResultRow {
        ResultRow(
            self.deal.product_description.clone(),
            self.deal.price,
            self.estimate,
            format!("{:.1}%", self.discount * 100.0),
            format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">View Deal</a>",
                self.deal.url
            ),
        )
    }
}

/// One result row; serializes as a JSON array of five elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRow(pub String, pub f64, pub f64, pub String, pub String);

/// Severity of a pipeline log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A structured log event streamed to observers. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Raw message text
    pub message: String,
    /// Display form: "[timestamp] [LEVEL] message"
    pub formatted_message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        let message = message.into();
        let timestamp = Utc::now();
        let formatted_message = format!(
            "[{}] [{}] {}",
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            level.as_str(),
            message
        );
        Self { timestamp, level, message, formatted_message }
    }
}
