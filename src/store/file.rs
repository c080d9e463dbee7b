// src/store/file.rs
//! JSON-snapshot store: every mutation is applied to a copy of the state, the
//! copy is written to disk (tmp file + rename), and only then swapped in. A
//! failed write leaves both the file and the in-memory state untouched.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::memory::StoreState;
use super::{ArticleFilter, ArticleStore, InsertSummary, StoreError, UpsertSummary};
use crate::model::{Article, ArticleId, PipelineRun, RunId};

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default)]
    runs: Vec<PipelineRun>,
}

pub struct FileStore {
    path: PathBuf,
    // async lock: held across the blocking write so snapshots land in order
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open (or start) a store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(s) => {
                let snap: Snapshot = serde_json::from_str(&s)
                    .map_err(StoreError::from)
                    .with_context(|| format!("loading store snapshot {}", path.display()))?;
                StoreState::from_parts(snap.articles, snap.runs)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => {
                return Err(StoreError::from(e))
                    .with_context(|| format!("reading store snapshot {}", path.display()))
            }
        };
        tracing::info!(path = %path.display(), articles = state.len(), "file store opened");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, st: &StoreState) -> Result<()> {
        let snap = SnapshotRef {
            articles: st.articles().collect(),
            runs: st.runs(),
        };
        let bytes = serde_json::to_vec(&snap).map_err(StoreError::from)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .context("store writer task failed")?
            .with_context(|| format!("writing store snapshot {}", self.path.display()))
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    articles: Vec<&'a Article>,
    runs: &'a [PipelineRun],
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[async_trait::async_trait]
impl ArticleStore for FileStore {
    async fn insert_new_only(
        &self,
        articles: &[Article],
        run_id: Option<RunId>,
    ) -> Result<InsertSummary> {
        let mut st = self.state.lock().await;
        let mut next = st.clone();
        let out = next.insert_new_only(articles, run_id);
        if out.inserted_count > 0 {
            self.persist(&next).await?;
            *st = next;
        }
        Ok(out)
    }

    async fn upsert_many(&self, articles: &[Article]) -> Result<UpsertSummary> {
        let mut st = self.state.lock().await;
        let mut next = st.clone();
        let out = next.upsert_many(articles);
        self.persist(&next).await?;
        *st = next;
        Ok(out)
    }

    async fn read_page(
        &self,
        limit: usize,
        cursor: Option<ArticleId>,
        filter: &ArticleFilter,
    ) -> Result<Vec<Article>> {
        let st = self.state.lock().await;
        Ok(st.read_page(limit, cursor, filter))
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        let st = self.state.lock().await;
        Ok(st.existing_urls(urls))
    }

    async fn record_run(&self, run: &PipelineRun) -> Result<()> {
        let mut st = self.state.lock().await;
        let mut next = st.clone();
        next.record_run(run);
        self.persist(&next).await?;
        *st = next;
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>> {
        let st = self.state.lock().await;
        Ok(st.recent_runs(limit))
    }
}
