// src/model/run.rs
//! Per-run execution record persisted once at the end of every live pipeline pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// What one source adapter did during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub name: String,
    pub ok: bool,
    pub articles: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whatever the adapter reported about itself (counts, timings, errors).
    /// Kept nested: adapter keys are free-form and may shadow the fields above.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentCounts {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Config values worth keeping alongside a run for later diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfigSnapshot {
    pub limit: usize,
    pub concurrent_fetch: bool,
    pub enrich_on_ingest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Articles attempted: per-source limit times active sources.
    pub limit: usize,
    pub duration_secs: f64,
    pub status: RunStatus,
    pub config: RunConfigSnapshot,
    pub sources: Vec<SourceOutcome>,
    pub articles_fetched: usize,
    /// Successfully enriched before insert; 0 when enrichment did not run.
    #[serde(default)]
    pub articles_enriched: usize,
    pub articles_inserted: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
