// src/bootstrap.rs
//! Wire a `Pipeline` from `PipelineConfig`: one RSS source per configured feed,
//! the LLM summarizer when AI is on, and the configured store.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::enrich::{DynEnrichment, Enricher, OpenAiSummarizer, StaticSummarizer};
use crate::ingest::providers::RssSource;
use crate::ingest::types::DynSource;
use crate::model::{Enrichment, Sentiment};
use crate::pipeline::{Pipeline, PipelineDeps};
use crate::store::{DynStore, FileStore, MemoryStore};

/// `AI_TEST_MODE=mock` swaps the LLM for a deterministic stub.
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

pub fn build_sources(cfg: &PipelineConfig) -> Result<Vec<DynSource>> {
    let mut out: Vec<DynSource> = Vec::new();
    for s in cfg.active_sources() {
        let src = RssSource::from_url(&s.name, &s.url, cfg.source_limit(s))
            .with_context(|| format!("building source {}", s.name))?;
        out.push(Arc::new(src));
    }
    if out.is_empty() {
        warn!("no active sources configured; live runs will fetch nothing");
    }
    Ok(out)
}

pub fn build_summarizer(cfg: &PipelineConfig) -> Result<Option<DynEnrichment>> {
    let mock = std::env::var(ENV_AI_TEST_MODE)
        .map(|v| v == "mock")
        .unwrap_or(false);
    if mock {
        let overlay = Enrichment {
            summary_short: Some("Neutral summary (mock)".to_string()),
            sentiment: Some(Sentiment::Neutral),
            sentiment_score: Some(0.0),
            ..Default::default()
        };
        return Ok(Some(Arc::new(StaticSummarizer::new(overlay))));
    }
    if !cfg.ai.enabled {
        return Ok(None);
    }
    let client = OpenAiSummarizer::from_config(&cfg.ai)?;
    Ok(Some(Arc::new(client)))
}

pub fn build_store(cfg: &PipelineConfig) -> Result<DynStore> {
    Ok(match &cfg.store.path {
        Some(p) => Arc::new(FileStore::open(p.clone())?),
        None => {
            warn!("no store path configured; articles are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    })
}

pub fn build_pipeline(cfg: PipelineConfig) -> Result<Pipeline> {
    let sources = build_sources(&cfg)?;
    let enricher = build_summarizer(&cfg)?.map(|adapter| {
        Enricher::new(adapter)
            .with_max_workers(cfg.enrichment.max_workers)
            .with_timeout(cfg.enrichment.per_call_timeout())
    });
    let store = build_store(&cfg)?;

    // Safe diagnostics only: never the key itself.
    info!(
        sources = sources.len(),
        enricher = enricher.as_ref().map(|e| e.adapter_name()).unwrap_or("disabled"),
        model = %cfg.ai.model,
        enrich_on_ingest = cfg.enrich_on_ingest,
        "pipeline wired"
    );

    Ok(Pipeline::new(
        cfg,
        PipelineDeps {
            sources,
            enricher,
            store,
        },
    ))
}
