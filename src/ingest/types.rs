// src/ingest/types.rs
use anyhow::Result;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::model::Article;

/// One news source. `metadata()` is read after `scrape()` settles and lands in
/// the run record under this source's entry.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn scrape(&self) -> Result<Vec<Article>>;
    fn name(&self) -> &str;
    fn metadata(&self) -> Map<String, Value> {
        Map::new()
    }
}

pub type DynSource = Arc<dyn SourceAdapter>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Adapters run one after another in configured order.
    Sequential,
    /// One task per adapter, all in flight at once.
    #[default]
    Concurrent,
}
