//! Durable deal memory
//!
//! Remembers every deal identifier ever accepted plus the accepted deals
//! themselves, so reruns never surface the same deal twice. The whole state
//! is one JSON document rewritten atomically on each flush. The
//! record-and-flush sequence for one job holds a single lock, so two jobs can
//! never interleave partial writes.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::DealError;
use crate::types::Opportunity;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryState {
    seen: HashSet<String>,
    accepted: Vec<Opportunity>,
}

/// File-backed memory shared by all jobs. Single writer at a time.
pub struct DealMemory {
    path: PathBuf,
    state: Mutex<MemoryState>,
}

impl DealMemory {
    /// Load memory from disk. A missing file is a fresh start, not an error;
    /// an unreadable file is reported and replaced on the next flush.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => state,
                Err(err) => {
                    warn!("memory file {} is unreadable ({err}), starting empty", path.display());
                    MemoryState::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => MemoryState::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading memory at {}", path.display()))
            }
        };

        Ok(Self { path, state: Mutex::new(state) })
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.seen.contains(id)
    }

    /// Consistent snapshot of every seen id, for the scanner's dedup pass.
    pub async fn seen_ids(&self) -> HashSet<String> {
        self.state.lock().await.seen.clone()
    }

    pub async fn accepted_count(&self) -> usize {
        self.state.lock().await.accepted.len()
    }

    pub async fn accepted(&self) -> Vec<Opportunity> {
        self.state.lock().await.accepted.clone()
    }

    /// Append a job's accepted deals and persist. Idempotent per deal id:
    /// replaying an already-recorded deal changes nothing. The lock is held
    /// across the flush so concurrent jobs serialize here.
    pub async fn record_and_flush(
        &self,
        opportunities: &[Opportunity],
    ) -> Result<usize, DealError> {
        let mut state = self.state.lock().await;

        let mut recorded = 0usize;
        for opportunity in opportunities {
            let id = opportunity.deal.id();
            if state.seen.insert(id) {
                state.accepted.push(opportunity.clone());
                recorded += 1;
            }
        }

        self.flush(&state).await?;
        Ok(recorded)
    }

    /// Rewrite the memory file as one atomic unit: write a temp file next to
    /// the target, then rename over it.
    async fn flush(&self, state: &MemoryState) -> Result<(), DealError> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| DealError::Persistence(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DealError::Persistence(e.to_string()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| DealError::Persistence(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DealError::Persistence(e.to_string()))?;
        Ok(())
    }
}
