// src/enrich/mod.rs
//! Enrichment stage: bounded fan-out of articles to an `EnrichmentAdapter`,
//! tolerant of per-item failure.
pub mod adapter;
pub mod openai;

use futures::stream::{self, StreamExt};
use metrics::counter;
use std::time::Duration;
use thiserror::Error;

pub use adapter::{DynEnrichment, EnrichmentAdapter, StaticSummarizer};
pub use openai::OpenAiSummarizer;

use crate::model::{Article, EnrichmentCounts};

pub const DEFAULT_MAX_WORKERS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichFailure {
    #[error("adapter error: {0}")]
    Adapter(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("empty enrichment result")]
    Empty,
    #[error("worker task failed: {0}")]
    Panicked(String),
}

impl EnrichFailure {
    fn label(&self) -> &'static str {
        match self {
            Self::Adapter(_) => "adapter",
            Self::Timeout(_) => "timeout",
            Self::Empty => "empty",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Outcome of one article's enrichment.
#[derive(Debug, Clone)]
pub enum EnrichmentResult {
    Enriched(Article),
    Failed { url: String, reason: EnrichFailure },
}

#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// Successfully enriched articles, in input order.
    pub articles: Vec<Article>,
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<(String, EnrichFailure)>,
}

impl EnrichmentReport {
    pub fn counts(&self) -> EnrichmentCounts {
        EnrichmentCounts {
            processed: self.processed,
            updated: self.updated,
            failed: self.failed,
        }
    }
}

/// Coordinator around one adapter. At most `max_workers` calls are in flight.
#[derive(Clone)]
pub struct Enricher {
    adapter: DynEnrichment,
    max_workers: usize,
    per_call_timeout: Option<Duration>,
}

impl Enricher {
    pub fn new(adapter: DynEnrichment) -> Self {
        Self {
            adapter,
            max_workers: DEFAULT_MAX_WORKERS,
            per_call_timeout: None,
        }
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Enrich every article independently and merge the results.
    ///
    /// Failed items are counted and left out of `articles`; nothing is retried.
    pub async fn enrich_batch(&self, articles: Vec<Article>) -> EnrichmentReport {
        let tasks = articles.into_iter().enumerate().map(|(idx, article)| {
            let adapter = self.adapter.clone();
            let timeout = self.per_call_timeout;
            async move {
                let url = article.url.clone();
                // Own task per item so a panicking adapter only loses that item.
                let result = match tokio::spawn(enrich_one(adapter, article, timeout)).await {
                    Ok(r) => r,
                    Err(e) => EnrichmentResult::Failed {
                        url,
                        reason: EnrichFailure::Panicked(e.to_string()),
                    },
                };
                (idx, result)
            }
        });

        let mut settled: Vec<(usize, EnrichmentResult)> = stream::iter(tasks)
            .buffer_unordered(self.max_workers)
            .collect()
            .await;
        settled.sort_by_key(|(idx, _)| *idx);

        let mut report = EnrichmentReport {
            processed: settled.len(),
            ..Default::default()
        };
        for (_, r) in settled {
            match r {
                EnrichmentResult::Enriched(a) => {
                    report.updated += 1;
                    report.articles.push(a);
                }
                EnrichmentResult::Failed { url, reason } => {
                    tracing::warn!(%url, reason = %reason, "enrichment failed");
                    counter!("enrich_failed_total", "reason" => reason.label()).increment(1);
                    report.failed += 1;
                    report.failures.push((url, reason));
                }
            }
        }
        counter!("enrich_updated_total").increment(report.updated as u64);
        report
    }
}

async fn enrich_one(
    adapter: DynEnrichment,
    article: Article,
    timeout: Option<Duration>,
) -> EnrichmentResult {
    let call = adapter.summarize(&article);
    let res = match timeout {
        Some(d) => match tokio::time::timeout(d, call).await {
            Ok(r) => r,
            Err(_) => {
                return EnrichmentResult::Failed {
                    url: article.url.clone(),
                    reason: EnrichFailure::Timeout(d),
                }
            }
        },
        None => call.await,
    };

    match res {
        Ok(Some(overlay)) => {
            let overlay = overlay.sanitize();
            if overlay.is_empty() {
                return EnrichmentResult::Failed {
                    url: article.url,
                    reason: EnrichFailure::Empty,
                };
            }
            tracing::debug!(url = %article.url, fields = overlay.present_fields().len(), "enriched");
            EnrichmentResult::Enriched(article.merged(overlay))
        }
        Ok(None) => EnrichmentResult::Failed {
            url: article.url,
            reason: EnrichFailure::Empty,
        },
        Err(e) => EnrichmentResult::Failed {
            url: article.url,
            reason: EnrichFailure::Adapter(format!("{e:#}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Enrichment, Sentiment};
    use std::sync::Arc;

    fn overlay() -> Enrichment {
        Enrichment {
            sentiment: Some(Sentiment::Neutral),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_overlay_counts_as_failure() {
        let stub = StaticSummarizer::new(Enrichment::default());
        let report = Enricher::new(Arc::new(stub))
            .enrich_batch(vec![Article::new("u", "t", "c")])
            .await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].1, EnrichFailure::Empty);
    }

    #[tokio::test]
    async fn output_keeps_input_order() {
        let urls: Vec<String> = (0..20).map(|i| format!("https://x.test/{i}")).collect();
        let articles = urls.iter().map(|u| Article::new(u, "t", "c")).collect();
        let report = Enricher::new(Arc::new(StaticSummarizer::new(overlay())))
            .with_max_workers(3)
            .enrich_batch(articles)
            .await;
        let got: Vec<_> = report.articles.iter().map(|a| a.url.clone()).collect();
        assert_eq!(got, urls);
    }
}
