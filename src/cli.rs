//! Command-line interface
//!
//! `serve` runs the HTTP/WebSocket server; `run` executes one pipeline pass
//! in-process; `search`/`watch` drive a remote server using the standard
//! client polling schedule.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::agents;
use crate::bus::LogBroadcaster;
use crate::config::{self, Config};
use crate::feeds;
use crate::memory::DealMemory;

#[derive(Parser)]
#[command(name = "dealsense", version, about = "Autonomous deal-hunting agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server
    Serve {
        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one scan/predict/persist pass in-process and print the results
    Run {
        /// Categories to scan (defaults to Electronics)
        categories: Vec<String>,
    },
    /// Submit a search to a running server and poll it to completion
    Search {
        /// Categories to scan
        categories: Vec<String>,
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        base_url: String,
    },
    /// Poll an existing job to completion
    Watch {
        job_id: String,
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        base_url: String,
    },
    /// List the known categories
    Categories,
    /// Show the configuration file path and contents
    Config,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port } => {
            let config = Config::load()?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            crate::server::start(&host, port, config).await
        }
        Command::Run { categories } => run_once(categories).await,
        Command::Search { categories, base_url } => {
            let job_id = submit_remote(&base_url, &categories).await?;
            println!("Submitted job {job_id}");
            watch_remote(&base_url, &job_id).await
        }
        Command::Watch { job_id, base_url } => watch_remote(&base_url, &job_id).await,
        Command::Categories => {
            for (name, _) in feeds::CATEGORY_FEEDS {
                println!("{name}");
            }
            Ok(())
        }
        Command::Config => {
            let path = config::config_path()?;
            let config = Config::load()?;
            println!("# {}", path.display());
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// One full pipeline pass without the server, mirroring what a job does.
async fn run_once(categories: Vec<String>) -> Result<()> {
    let config = Config::load()?;
    let bus = Arc::new(LogBroadcaster::new());

    let planner = agents::build_planner(&config, bus.clone())?;
    let memory = DealMemory::load(config.memory.resolve_path()?).await?;

    let categories = if categories.is_empty() {
        vec!["Electronics".to_string()]
    } else {
        categories
    };

    let seen = memory.seen_ids().await;
    let opportunities = planner.plan(&categories, seen).await?;
    memory.record_and_flush(&opportunities).await?;

    if opportunities.is_empty() {
        println!("No deals above the discount threshold this run.");
        return Ok(());
    }

    println!("{} deals above threshold:", opportunities.len());
    for opp in &opportunities {
        println!(
            "  {:.1}%  ${:>8.2} (est ${:>8.2})  {}",
            opp.discount * 100.0,
            opp.deal.price,
            opp.estimate,
            opp.deal.product_description
        );
        println!("         {}", opp.deal.url);
    }
    Ok(())
}

async fn submit_remote(base_url: &str, categories: &[String]) -> Result<String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base_url}/api/search"))
        .json(&serde_json::json!({ "selected_categories": categories }))
        .send()
        .await
        .context("submitting search")?;

    let status = response.status();
    let body: serde_json::Value = response.json().await.context("reading submit response")?;
    if !status.is_success() {
        bail!(
            "search rejected ({status}): {}",
            body.get("detail").and_then(|d| d.as_str()).unwrap_or("unknown error")
        );
    }
    body.get("job_id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .context("submit response had no job_id")
}

/// Maximum status polls before the client gives up.
const MAX_POLL_ATTEMPTS: u32 = 60;

/// Delay before a given 1-based poll attempt: the first poll is immediate,
/// then 3s for five attempts, 5s for ten, 10s after that.
fn poll_delay(attempt: u32) -> Duration {
    match attempt {
        0 | 1 => Duration::ZERO,
        2..=6 => Duration::from_secs(3),
        7..=16 => Duration::from_secs(5),
        _ => Duration::from_secs(10),
    }
}

async fn watch_remote(base_url: &str, job_id: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{base_url}/api/results/{job_id}");
    let mut last_status = String::new();

    for attempt in 1..=MAX_POLL_ATTEMPTS {
        tokio::time::sleep(poll_delay(attempt)).await;

        let response = client.get(&url).send().await.context("polling job status")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            bail!("job {job_id} not found");
        }
        let body: serde_json::Value =
            response.json().await.context("reading job status response")?;

        let status =
            body.get("status").and_then(|s| s.as_str()).unwrap_or("unknown").to_string();
        if status != last_status {
            println!("status: {status}");
            last_status = status.clone();
        }

        match status.as_str() {
            "completed" => {
                let count = body.get("total_count").and_then(|c| c.as_u64()).unwrap_or(0);
                println!("{count} deals found");
                if let Some(rows) = body.get("results").and_then(|r| r.as_array()) {
                    for row in rows {
                        if let Some(cells) = row.as_array() {
                            println!("  {}", serde_json::to_string(cells)?);
                        }
                    }
                }
                return Ok(());
            }
            "error" => {
                bail!(
                    "job failed: {}",
                    body.get("error_message").and_then(|e| e.as_str()).unwrap_or("unknown")
                );
            }
            _ => {}
        }
    }

    bail!("job {job_id} still not finished after {MAX_POLL_ATTEMPTS} polls, giving up")
}
