// tests/common/mod.rs
// Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use finnews_pipeline::enrich::{Enricher, StaticSummarizer};
use finnews_pipeline::ingest::types::DynSource;
use finnews_pipeline::model::{Article, ArticleId, Enrichment, PipelineRun, RunId, Sentiment};
use finnews_pipeline::store::{
    ArticleFilter, ArticleStore, DynStore, InsertSummary, MemoryStore, UpsertSummary,
};
use finnews_pipeline::{Pipeline, PipelineConfig, PipelineDeps};

/// `https://news.test/{tag}/{i}` published `2024-01-01T00:{i:02}:00Z`.
pub fn article(tag: &str, i: usize) -> Article {
    Article::new(
        format!("https://news.test/{tag}/{i}"),
        format!("{tag} headline {i}"),
        format!("{tag} body {i}"),
    )
    .with_publish_date(format!("2024-01-01T00:{:02}:00Z", i % 60))
}

pub fn articles(tag: &str, n: usize) -> Vec<Article> {
    (0..n).map(|i| article(tag, i)).collect()
}

pub fn neutral() -> Enrichment {
    Enrichment {
        summary_short: Some("Markets steady.".into()),
        sentiment: Some(Sentiment::Neutral),
        sentiment_score: Some(0.0),
        ..Default::default()
    }
}

pub fn enricher(stub: StaticSummarizer) -> Enricher {
    Enricher::new(Arc::new(stub))
}

pub fn pipeline(
    cfg: PipelineConfig,
    sources: Vec<DynSource>,
    enricher: Option<Enricher>,
    store: DynStore,
) -> Pipeline {
    Pipeline::new(
        cfg,
        PipelineDeps {
            sources,
            enricher,
            store,
        },
    )
}

/// Memory store with switchable write failures; counts page reads.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_inserts: bool,
    /// 1-based upsert calls that fail.
    pub fail_upsert_calls: HashSet<usize>,
    upserts: AtomicUsize,
    reads: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Default::default()
        }
    }

    pub fn failing_upserts(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_upsert_calls: calls.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Number of `read_page` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArticleStore for FlakyStore {
    async fn insert_new_only(
        &self,
        articles: &[Article],
        run_id: Option<RunId>,
    ) -> Result<InsertSummary> {
        if self.fail_inserts {
            bail!("disk full");
        }
        self.inner.insert_new_only(articles, run_id).await
    }

    async fn upsert_many(&self, articles: &[Article]) -> Result<UpsertSummary> {
        let n = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upsert_calls.contains(&n) {
            bail!("upsert {n} rejected");
        }
        self.inner.upsert_many(articles).await
    }

    async fn read_page(
        &self,
        limit: usize,
        cursor: Option<ArticleId>,
        filter: &ArticleFilter,
    ) -> Result<Vec<Article>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_page(limit, cursor, filter).await
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        self.inner.existing_urls(urls).await
    }

    async fn record_run(&self, run: &PipelineRun) -> Result<()> {
        self.inner.record_run(run).await
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>> {
        self.inner.recent_runs(limit).await
    }
}
