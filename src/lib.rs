//! DealSense - deal discovery library
//!
//! Scans category feeds for candidate deals, prices each one with an
//! ensemble of independent predictors, and surfaces only deals whose
//! discount clears a configured threshold. Jobs run as background tasks
//! observable by polling and over a live log stream.
//!
//! # Example
//!
//! ```ignore
//! use dealsense::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     dealsense::server::start("127.0.0.1", 8000, config).await
//! }
//! ```

// Core modules
pub mod types;
pub mod error;
pub mod config;
pub mod bus;
pub mod feeds;
pub mod memory;
pub mod agents;
pub mod jobs;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use agents::{EnsembleAgent, EnsembleWeights, PlanningAgent, Predictor};
pub use bus::LogBroadcaster;
pub use config::Config;
pub use error::DealError;
pub use jobs::{Job, JobRegistry, JobState};
pub use memory::DealMemory;
pub use types::{Deal, LogEvent, LogLevel, Opportunity, ResultRow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
