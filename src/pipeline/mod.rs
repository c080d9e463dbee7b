// src/pipeline/mod.rs
//! Run orchestration: one live pass (fetch → optional enrich → insert-new →
//! run record) and the out-of-band backfill pass.
pub mod backfill;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, gauge, histogram};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tracing::Instrument;

pub use backfill::{BackfillOptions, BackfillReport};

use crate::config::PipelineConfig;
use crate::enrich::Enricher;
use crate::ingest::{self, types::DynSource, FetchReport};
use crate::model::{
    Article, EnrichmentCounts, PipelineRun, RunConfigSnapshot, RunId, RunStatus, SourceOutcome,
};
use crate::store::{DynStore, InsertSummary};

/// Collaborators a pipeline runs against. Built once, owned by the pipeline.
#[derive(Clone)]
pub struct PipelineDeps {
    pub sources: Vec<DynSource>,
    /// Absent when AI is disabled; enrichment stages are skipped then.
    pub enricher: Option<Enricher>,
    pub store: DynStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Init,
    Fetching,
    Enriching,
    Persisting,
    Finalizing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Init => "init",
            RunStage::Fetching => "fetching",
            RunStage::Enriching => "enriching",
            RunStage::Persisting => "persisting",
            RunStage::Finalizing => "finalizing",
            RunStage::Done => "done",
        };
        f.write_str(s)
    }
}

pub struct Pipeline {
    cfg: PipelineConfig,
    deps: PipelineDeps,
}

/// Mutable bookkeeping for one live run.
struct RunState {
    run_id: RunId,
    stage: RunStage,
    start_time: chrono::DateTime<Utc>,
    t0: Instant,
    sources: Vec<SourceOutcome>,
    fetched: usize,
    enrichment: Option<EnrichmentCounts>,
    insert: InsertSummary,
}

impl RunState {
    fn enter(&mut self, stage: RunStage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig, deps: PipelineDeps) -> Self {
        Self {
            cfg: cfg.sanitized(),
            deps,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn store(&self) -> &DynStore {
        &self.deps.store
    }

    /// One live pass. Source and per-article failures are recorded in the
    /// returned `PipelineRun`; only fetch/persist faults surface as `Err`.
    pub async fn run(&self) -> Result<PipelineRun> {
        crate::metrics::ensure_metrics_described();
        let run_id = RunId::generate();
        let span = tracing::info_span!("pipeline_run", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: RunId) -> Result<PipelineRun> {
        let mut st = RunState {
            run_id,
            stage: RunStage::Init,
            start_time: Utc::now(),
            t0: Instant::now(),
            sources: Vec::new(),
            fetched: 0,
            enrichment: None,
            insert: InsertSummary::default(),
        };
        let attempted = self.attempted();
        tracing::info!(
            sources = self.deps.sources.len(),
            attempted,
            "starting article pipeline run"
        );

        st.enter(RunStage::Fetching);
        let FetchReport { articles, sources } =
            ingest::fetch_all(&self.deps.sources, self.cfg.fetch_mode).await;
        st.fetched = articles.len();
        st.sources = sources;
        tracing::info!(fetched = st.fetched, "fetch stage finished");

        let to_insert = match &self.deps.enricher {
            Some(enricher) if self.cfg.enrich_on_ingest && !articles.is_empty() => {
                st.enter(RunStage::Enriching);
                self.enrich_new(enricher, articles, &mut st).await
            }
            _ => articles,
        };

        st.enter(RunStage::Persisting);
        if to_insert.is_empty() {
            tracing::info!("no new articles fetched");
        } else {
            match self
                .deps
                .store
                .insert_new_only(&to_insert, Some(st.run_id))
                .await
                .context("inserting fetched articles")
            {
                Ok(summary) => {
                    tracing::info!(
                        inserted = summary.inserted_count,
                        existing = summary.existing_count,
                        unique = summary.total_unique,
                        "persist stage finished"
                    );
                    counter!("store_inserted_total").increment(summary.inserted_count as u64);
                    st.insert = summary;
                }
                Err(e) => {
                    tracing::error!(error = ?e, "persist stage failed");
                    let failed = self.finalize(&mut st, RunStatus::Failure, Some(format!("{e:#}")));
                    if let Err(rec) = self.deps.store.record_run(&failed).await {
                        tracing::warn!(error = ?rec, "could not record failed run");
                    }
                    return Err(e);
                }
            }
        }

        st.enter(RunStage::Finalizing);
        let run = self.finalize(&mut st, RunStatus::Success, None);
        self.deps
            .store
            .record_run(&run)
            .await
            .context("recording pipeline run")?;

        st.enter(RunStage::Done);
        tracing::info!(
            duration_secs = run.duration_secs,
            fetched = run.articles_fetched,
            inserted = run.articles_inserted,
            "article pipeline run completed"
        );
        Ok(run)
    }

    /// Enrich only urls the store has not seen; known ones pass through
    /// untouched and will be counted as existing by the insert.
    async fn enrich_new(
        &self,
        enricher: &Enricher,
        articles: Vec<Article>,
        st: &mut RunState,
    ) -> Vec<Article> {
        let urls: Vec<String> = articles.iter().map(|a| a.url.clone()).collect();
        let known = match self.deps.store.existing_urls(&urls).await {
            Ok(k) => k,
            Err(e) => {
                tracing::warn!(error = ?e, "could not check existing urls; enriching all");
                HashSet::new()
            }
        };

        let mut seen = HashSet::new();
        let (mut pass_through, fresh): (Vec<Article>, Vec<Article>) = articles
            .into_iter()
            .filter(|a| seen.insert(a.url.clone()))
            .partition(|a| known.contains(&a.url));

        let report = enricher.enrich_batch(fresh).await;
        tracing::info!(
            processed = report.processed,
            updated = report.updated,
            failed = report.failed,
            skipped_known = pass_through.len(),
            "enrich stage finished"
        );
        st.enrichment = Some(report.counts());
        pass_through.extend(report.articles);
        pass_through
    }

    fn attempted(&self) -> usize {
        self.cfg.article_limit * self.deps.sources.len()
    }

    fn finalize(&self, st: &mut RunState, status: RunStatus, error: Option<String>) -> PipelineRun {
        let elapsed = st.t0.elapsed();
        let status_label = match status {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        };
        counter!("pipeline_runs_total", "status" => status_label).increment(1);
        histogram!("pipeline_run_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);

        PipelineRun {
            run_id: st.run_id,
            start_time: st.start_time,
            end_time: Utc::now(),
            limit: self.attempted(),
            duration_secs: elapsed.as_secs_f64(),
            status,
            config: RunConfigSnapshot {
                limit: self.cfg.article_limit,
                concurrent_fetch: matches!(
                    self.cfg.fetch_mode,
                    crate::ingest::types::FetchMode::Concurrent
                ),
                enrich_on_ingest: self.cfg.enrich_on_ingest && self.deps.enricher.is_some(),
            },
            sources: std::mem::take(&mut st.sources),
            articles_fetched: st.fetched,
            articles_enriched: st.enrichment.map_or(0, |c| c.updated),
            articles_inserted: st.insert.inserted_count,
            enrichment: st.enrichment,
            error,
        }
    }
}
