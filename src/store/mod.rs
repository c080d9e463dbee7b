// src/store/mod.rs
//! Persistence seam. Articles are keyed on `url`; runs are append-only.
pub mod file;
pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::model::{Article, ArticleId, PipelineRun, RunId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertSummary {
    pub inserted_count: usize,
    pub existing_count: usize,
    pub total_unique: usize,
    /// url -> newly assigned id, only for rows this call created.
    pub inserted_ids: BTreeMap<String, ArticleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Existing rows overwritten.
    pub matched: usize,
    /// Rows created because the url was unknown.
    pub inserted: usize,
}

/// Optional narrowing for paginated reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFilter {
    #[serde(default)]
    pub source: Option<String>,
    /// Only articles with no enrichment fields at all.
    #[serde(default)]
    pub only_unenriched: bool,
}

impl ArticleFilter {
    pub fn matches(&self, a: &Article) -> bool {
        if let Some(src) = &self.source {
            if !a.source.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(src)) {
                return false;
            }
        }
        !(self.only_unenriched && a.is_enriched())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store snapshot is not valid json: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Durable article store.
///
/// Implementations must make each batch call atomic per key: two concurrent
/// `insert_new_only` calls for the same url create exactly one row.
#[async_trait::async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert-if-absent keyed on url. Duplicates inside `articles` collapse to
    /// the first occurrence; existing urls are counted, never overwritten.
    async fn insert_new_only(&self, articles: &[Article], run_id: Option<RunId>)
        -> Result<InsertSummary>;

    /// Overwrite by url (used by backfill). Identity and insert metadata of an
    /// existing row are preserved.
    async fn upsert_many(&self, articles: &[Article]) -> Result<UpsertSummary>;

    /// Up to `limit` articles with id strictly greater than `cursor`, ascending.
    async fn read_page(
        &self,
        limit: usize,
        cursor: Option<ArticleId>,
        filter: &ArticleFilter,
    ) -> Result<Vec<Article>>;

    /// Subset of `urls` already stored. Lets callers skip expensive work for
    /// articles an insert would ignore anyway.
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>>;

    async fn record_run(&self, run: &PipelineRun) -> Result<()>;

    /// Most recent runs first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>>;
}

pub type DynStore = Arc<dyn ArticleStore>;
