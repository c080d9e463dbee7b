// src/enrich/adapter.rs
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::model::{Article, Enrichment};

/// LLM-backed classifier. `Ok(None)` means the provider answered with nothing
/// usable; the coordinator counts that as a failure just like `Err`.
#[async_trait::async_trait]
pub trait EnrichmentAdapter: Send + Sync {
    async fn summarize(&self, article: &Article) -> Result<Option<Enrichment>>;
    fn name(&self) -> &'static str;
}

pub type DynEnrichment = Arc<dyn EnrichmentAdapter>;

/// Deterministic stub: returns the same overlay for every article, except for
/// URLs configured to fail, hang, or come back empty.
#[derive(Default)]
pub struct StaticSummarizer {
    overlay: Enrichment,
    fail_urls: HashSet<String>,
    empty_urls: HashSet<String>,
    slow_urls: HashSet<String>,
    slow_delay: Duration,
    calls: AtomicUsize,
}

impl StaticSummarizer {
    pub fn new(overlay: Enrichment) -> Self {
        Self {
            overlay,
            slow_delay: Duration::from_secs(30),
            ..Default::default()
        }
    }

    pub fn failing_on<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn empty_on<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.empty_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn slow_on<I, S>(mut self, urls: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slow_urls.extend(urls.into_iter().map(Into::into));
        self.slow_delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EnrichmentAdapter for StaticSummarizer {
    async fn summarize(&self, article: &Article) -> Result<Option<Enrichment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow_urls.contains(&article.url) {
            tokio::time::sleep(self.slow_delay).await;
        }
        if self.fail_urls.contains(&article.url) {
            return Err(anyhow!("stub failure for {}", article.url));
        }
        if self.empty_urls.contains(&article.url) {
            return Ok(None);
        }
        Ok(Some(self.overlay.clone()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
