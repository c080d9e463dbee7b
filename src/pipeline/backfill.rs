// src/pipeline/backfill.rs
//! Re-enrich stored articles page by page.
//!
//! Pages are read with a forward id cursor (never offset based), enriched with
//! a bounded worker pool and upserted back. Each page stands alone: a failed
//! upsert is logged and counted, earlier pages stay written, later pages still
//! run.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;

use super::Pipeline;
use crate::config::BackfillSettings;
use crate::model::ArticleId;
use crate::store::ArticleFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillOptions {
    pub batch_size: usize,
    pub max_workers: usize,
    #[serde(default)]
    pub per_call_timeout_ms: Option<u64>,
    /// Stop once this many articles have been processed.
    #[serde(default)]
    pub limit_total: Option<usize>,
    #[serde(default)]
    pub filter: ArticleFilter,
}

impl From<&BackfillSettings> for BackfillOptions {
    fn from(s: &BackfillSettings) -> Self {
        Self {
            batch_size: s.batch_size,
            max_workers: s.max_workers,
            per_call_timeout_ms: s.per_call_timeout_ms,
            limit_total: s.limit_total,
            filter: ArticleFilter {
                source: None,
                only_unenriched: s.only_unenriched,
            },
        }
    }
}

impl BackfillOptions {
    fn per_call_timeout(&self) -> Option<Duration> {
        self.per_call_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    /// Non-empty pages read.
    pub pages: usize,
    /// Pages whose upsert failed; their enrichment was lost for this run.
    pub upsert_failures: usize,
}

impl Pipeline {
    /// Backfill with the options from the loaded config.
    pub async fn backfill_default(&self) -> Result<BackfillReport> {
        let opts = BackfillOptions::from(&self.config().backfill);
        self.backfill(opts).await
    }

    pub async fn backfill(&self, opts: BackfillOptions) -> Result<BackfillReport> {
        let span = tracing::info_span!("backfill", batch_size = opts.batch_size);
        self.backfill_inner(opts).instrument(span).await
    }

    async fn backfill_inner(&self, opts: BackfillOptions) -> Result<BackfillReport> {
        let enricher = self
            .deps
            .enricher
            .as_ref()
            .ok_or_else(|| anyhow!("backfill needs an enrichment adapter but AI is disabled"))?
            .clone()
            .with_max_workers(opts.max_workers)
            .with_timeout(opts.per_call_timeout());
        let batch_size = opts.batch_size.max(1);
        let store = &self.deps.store;

        let mut report = BackfillReport::default();
        let mut cursor: Option<ArticleId> = None;

        loop {
            let page_limit = match opts.limit_total {
                Some(cap) => {
                    let remaining = cap.saturating_sub(report.processed);
                    if remaining == 0 {
                        break;
                    }
                    remaining.min(batch_size)
                }
                None => batch_size,
            };

            let page = store
                .read_page(page_limit, cursor, &opts.filter)
                .await
                .with_context(|| format!("reading backfill page after {cursor:?}"))?;
            if page.is_empty() {
                break;
            }
            let exhausted = page.len() < page_limit;

            let next = page.last().and_then(|a| a.id);
            match (cursor, next) {
                (_, None) => bail!("store returned an article without id; cannot advance cursor"),
                (Some(prev), Some(n)) if n <= prev => {
                    bail!("store cursor did not advance ({prev} -> {n})")
                }
                _ => cursor = next,
            }
            report.pages += 1;

            let enriched = enricher.enrich_batch(page).await;
            report.processed += enriched.processed;
            report.updated += enriched.updated;
            report.failed += enriched.failed;

            if !enriched.articles.is_empty() {
                match store.upsert_many(&enriched.articles).await {
                    Ok(s) => {
                        tracing::debug!(matched = s.matched, inserted = s.inserted, "page upserted")
                    }
                    Err(e) => {
                        report.upsert_failures += 1;
                        tracing::error!(error = ?e, page = report.pages, "page upsert failed");
                    }
                }
            }

            tracing::info!(
                page = report.pages,
                processed = report.processed,
                updated = report.updated,
                failed = report.failed,
                "backfill page done"
            );

            if exhausted {
                break;
            }
        }

        tracing::info!(
            pages = report.pages,
            processed = report.processed,
            updated = report.updated,
            failed = report.failed,
            upsert_failures = report.upsert_failures,
            "backfill finished"
        );
        Ok(report)
    }
}
