// src/ingest/providers/mock.rs
//! In-process sources for tests and local runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::ingest::types::SourceAdapter;
use crate::model::Article;

/// Returns a fixed batch on every scrape, or fails with a fixed message.
pub struct StaticSource {
    name: String,
    articles: Vec<Article>,
    error: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, articles: Vec<Article>) -> Self {
        Self {
            name: name.into(),
            articles,
            error: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(name, Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    async fn scrape(&self) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        match &self.error {
            Some(msg) => Err(anyhow!("{}: {msg}", self.name)),
            None => Ok(self
                .articles
                .iter()
                .cloned()
                .map(|a| if a.source.is_none() { a.with_source(&self.name) } else { a })
                .collect()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("calls".into(), json!(self.calls()));
        m.insert("configured".into(), json!(self.articles.len()));
        m
    }
}
