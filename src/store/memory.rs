// src/store/memory.rs
use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Mutex;

use super::{ArticleFilter, ArticleStore, InsertSummary, UpsertSummary};
use crate::model::{Article, ArticleId, PipelineRun, RunId};

/// Plain in-memory state; every batch operation runs under one lock held by
/// the owning store, which is what makes insert-if-absent atomic.
#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    next_id: u64,
    articles: BTreeMap<ArticleId, Article>,
    by_url: HashMap<String, ArticleId>,
    runs: Vec<PipelineRun>,
}

impl StoreState {
    pub(crate) fn from_parts(articles: Vec<Article>, runs: Vec<PipelineRun>) -> Self {
        let mut st = StoreState {
            runs,
            ..Default::default()
        };
        for mut a in articles {
            let id = match a.id {
                Some(id) => id,
                None => ArticleId(st.next_id + 1),
            };
            st.next_id = st.next_id.max(id.0);
            a.id = Some(id);
            st.by_url.insert(a.url.clone(), id);
            st.articles.insert(id, a);
        }
        st
    }

    pub(crate) fn articles(&self) -> impl Iterator<Item = &Article> {
        self.articles.values()
    }

    pub(crate) fn runs(&self) -> &[PipelineRun] {
        &self.runs
    }

    pub(crate) fn len(&self) -> usize {
        self.articles.len()
    }

    fn alloc_id(&mut self) -> ArticleId {
        self.next_id += 1;
        ArticleId(self.next_id)
    }

    pub(crate) fn insert_new_only(
        &mut self,
        articles: &[Article],
        run_id: Option<RunId>,
    ) -> InsertSummary {
        let now = Utc::now();
        let mut seen: HashSet<&str> = HashSet::with_capacity(articles.len());
        let mut out = InsertSummary::default();

        for a in articles {
            if a.url.trim().is_empty() {
                tracing::warn!(title = %a.title, "skipping article without url");
                continue;
            }
            if !seen.insert(a.url.as_str()) {
                continue;
            }
            out.total_unique += 1;
            if self.by_url.contains_key(&a.url) {
                out.existing_count += 1;
                continue;
            }
            let id = self.alloc_id();
            let mut row = a.clone();
            row.id = Some(id);
            row.created_at = Some(now);
            row.pipeline_run_id = run_id;
            self.by_url.insert(row.url.clone(), id);
            self.articles.insert(id, row);
            out.inserted_count += 1;
            out.inserted_ids.insert(a.url.clone(), id);
        }
        out
    }

    pub(crate) fn upsert_many(&mut self, articles: &[Article]) -> UpsertSummary {
        let now = Utc::now();
        let mut out = UpsertSummary::default();
        for a in articles {
            if a.url.trim().is_empty() {
                tracing::warn!(title = %a.title, "skipping article without url");
                continue;
            }
            let mut row = a.clone();
            match self.by_url.get(&a.url).copied() {
                Some(id) => {
                    if let Some(prev) = self.articles.get(&id) {
                        row.created_at = prev.created_at;
                        row.pipeline_run_id = prev.pipeline_run_id.or(row.pipeline_run_id);
                    }
                    row.id = Some(id);
                    self.articles.insert(id, row);
                    out.matched += 1;
                }
                None => {
                    let id = self.alloc_id();
                    row.id = Some(id);
                    row.created_at = Some(now);
                    self.by_url.insert(row.url.clone(), id);
                    self.articles.insert(id, row);
                    out.inserted += 1;
                }
            }
        }
        out
    }

    pub(crate) fn read_page(
        &self,
        limit: usize,
        cursor: Option<ArticleId>,
        filter: &ArticleFilter,
    ) -> Vec<Article> {
        let lower = match cursor {
            Some(c) => Bound::Excluded(c),
            None => Bound::Unbounded,
        };
        self.articles
            .range((lower, Bound::Unbounded))
            .map(|(_, a)| a)
            .filter(|a| filter.matches(a))
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn existing_urls(&self, urls: &[String]) -> HashSet<String> {
        urls.iter()
            .filter(|u| self.by_url.contains_key(u.as_str()))
            .cloned()
            .collect()
    }

    pub(crate) fn record_run(&mut self, run: &PipelineRun) {
        self.runs.push(run.clone());
    }

    pub(crate) fn recent_runs(&self, limit: usize) -> Vec<PipelineRun> {
        self.runs.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one stored article by url.
    pub fn get(&self, url: &str) -> Option<Article> {
        let st = self.state.lock().expect("store mutex poisoned");
        st.by_url.get(url).and_then(|id| st.articles.get(id)).cloned()
    }
}

#[async_trait::async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_new_only(
        &self,
        articles: &[Article],
        run_id: Option<RunId>,
    ) -> Result<InsertSummary> {
        let mut st = self.state.lock().expect("store mutex poisoned");
        Ok(st.insert_new_only(articles, run_id))
    }

    async fn upsert_many(&self, articles: &[Article]) -> Result<UpsertSummary> {
        let mut st = self.state.lock().expect("store mutex poisoned");
        Ok(st.upsert_many(articles))
    }

    async fn read_page(
        &self,
        limit: usize,
        cursor: Option<ArticleId>,
        filter: &ArticleFilter,
    ) -> Result<Vec<Article>> {
        let st = self.state.lock().expect("store mutex poisoned");
        Ok(st.read_page(limit, cursor, filter))
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        let st = self.state.lock().expect("store mutex poisoned");
        Ok(st.existing_urls(urls))
    }

    async fn record_run(&self, run: &PipelineRun) -> Result<()> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .record_run(run);
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>> {
        let st = self.state.lock().expect("store mutex poisoned");
        Ok(st.recent_runs(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art(url: &str) -> Article {
        Article::new(url, "t", "c")
    }

    #[tokio::test]
    async fn duplicate_urls_in_batch_collapse() {
        let store = MemoryStore::new();
        let batch = vec![art("a"), art("b"), art("a"), art("c"), art("b")];
        let s = store.insert_new_only(&batch, None).await.unwrap();
        assert_eq!(s.total_unique, 3);
        assert_eq!(s.inserted_count, 3);
        assert_eq!(s.existing_count, 0);
        assert_eq!(s.inserted_ids.len(), 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn insert_never_overwrites_existing() {
        let store = MemoryStore::new();
        store.insert_new_only(&[art("a")], None).await.unwrap();
        let mut changed = art("a");
        changed.title = "new title".into();
        let s = store.insert_new_only(&[changed], None).await.unwrap();
        assert_eq!(s.existing_count, 1);
        assert_eq!(store.get("a").unwrap().title, "t");
    }

    #[tokio::test]
    async fn upsert_keeps_identity_and_created_at() {
        let store = MemoryStore::new();
        let run = RunId::generate();
        store.insert_new_only(&[art("a")], Some(run)).await.unwrap();
        let before = store.get("a").unwrap();

        let mut changed = art("a");
        changed.title = "rewritten".into();
        let s = store.upsert_many(&[changed, art("z")]).await.unwrap();
        assert_eq!(s, UpsertSummary { matched: 1, inserted: 1 });

        let after = store.get("a").unwrap();
        assert_eq!(after.title, "rewritten");
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.pipeline_run_id, Some(run));
    }

    #[tokio::test]
    async fn read_page_is_cursor_based() {
        let store = MemoryStore::new();
        let batch: Vec<_> = (0..5).map(|i| art(&format!("u{i}"))).collect();
        store.insert_new_only(&batch, None).await.unwrap();

        let f = ArticleFilter::default();
        let p1 = store.read_page(2, None, &f).await.unwrap();
        assert_eq!(p1.len(), 2);
        let p2 = store.read_page(2, p1[1].id, &f).await.unwrap();
        assert_eq!(p2[0].url, "u2");
        let p3 = store.read_page(10, p2[1].id, &f).await.unwrap();
        assert_eq!(p3.len(), 1);
        assert!(store.read_page(10, p3[0].id, &f).await.unwrap().is_empty());
    }
}
