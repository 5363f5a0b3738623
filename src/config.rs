//! Configuration management
//!
//! TOML-backed configuration for the server, model endpoints, ensemble
//! weights, memory location, and job retention.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat-completions API settings (selection + frontier predictor)
    #[serde(default)]
    pub llm: LlmConfig,
    /// Remote predictor endpoints
    #[serde(default)]
    pub predictors: PredictorConfig,
    /// Ensemble combination and acceptance threshold
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    /// Memory persistence settings
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Job registry settings
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// API key; the DEALSENSE_API_KEY environment variable takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used for shortlist text selection
    #[serde(default = "default_selection_model")]
    pub selection_model: String,
    /// Model used by the frontier predictor
    #[serde(default = "default_frontier_model")]
    pub frontier_model: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_selection_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_frontier_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            selection_model: default_selection_model(),
            frontier_model: default_frontier_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("DEALSENSE_API_KEY") {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("no API key: set DEALSENSE_API_KEY or llm.api_key in config")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Fine-tuned specialist inference endpoint
    #[serde(default = "default_specialist_url")]
    pub specialist_url: String,
    /// Gradient-boosted regressor inference endpoint
    #[serde(default = "default_boost_url")]
    pub boost_url: String,
    /// Per-predictor call timeout in seconds
    #[serde(default = "default_predictor_timeout")]
    pub timeout_secs: u64,
}

fn default_specialist_url() -> String {
    "http://127.0.0.1:8001/price".to_string()
}

fn default_boost_url() -> String {
    "http://127.0.0.1:8002/price".to_string()
}

fn default_predictor_timeout() -> u64 {
    20
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            specialist_url: default_specialist_url(),
            boost_url: default_boost_url(),
            timeout_secs: default_predictor_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Minimum discount ratio (estimate - price) / estimate to accept a deal
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Optional trained weights artifact; compiled-in defaults otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_path: Option<PathBuf>,
}

fn default_threshold() -> f64 {
    0.2
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self { threshold: default_threshold(), weights_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    /// Memory file location; defaults to `<data dir>/memory.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl MemoryConfig {
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("memory.json")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Seconds a terminal job stays queryable before it is pruned
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

fn default_retention_secs() -> u64 {
    3600
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { retention_secs: default_retention_secs() }
    }
}

impl Config {
    /// Load configuration from file, writing defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&contents).context("Failed to parse config file")
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent().context("Config path has no parent")?;

        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "dealsense", "dealsense")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "dealsense", "dealsense")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}
