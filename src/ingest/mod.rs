// src/ingest/mod.rs
//! Fetch stage: run every active source adapter, keep whatever succeeded, and
//! hand back one list sorted newest-first.
pub mod providers;
pub mod types;

use crate::model::{sort_by_publish_desc, Article, SourceOutcome};
use crate::ingest::types::{DynSource, FetchMode, SourceAdapter};
use futures::FutureExt;
use metrics::{counter, histogram};
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Normalize text: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// First `max` chars of `s` (char-boundary safe).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    /// Union of every successful scrape, newest first.
    pub articles: Vec<Article>,
    /// One entry per adapter, in configured order.
    pub sources: Vec<SourceOutcome>,
}

impl FetchReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| !s.ok).count()
    }
}

type ScrapeResult = (anyhow::Result<Vec<Article>>, u64);

async fn scrape_one(source: &dyn SourceAdapter) -> ScrapeResult {
    let t0 = Instant::now();
    let res = match AssertUnwindSafe(source.scrape()).catch_unwind().await {
        Ok(r) => r,
        Err(panic) => Err(anyhow::anyhow!("scraper panicked: {}", panic_message(&*panic))),
    };
    (res, t0.elapsed().as_millis() as u64)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fold one adapter's result into the report. Failures are logged and recorded,
/// never raised.
fn settle(
    source: &dyn SourceAdapter,
    (res, elapsed_ms): ScrapeResult,
    articles: &mut Vec<Article>,
) -> SourceOutcome {
    let name = source.name().to_string();
    histogram!("fetch_source_ms", "source" => name.clone()).record(elapsed_ms as f64);
    let (ok, count, error) = match res {
        Ok(mut v) => {
            let n = v.len();
            counter!("fetch_articles_total", "source" => name.clone()).increment(n as u64);
            tracing::info!(source = %name, articles = n, elapsed_ms, "source scraped");
            articles.append(&mut v);
            (true, n, None)
        }
        Err(e) => {
            counter!("fetch_source_errors_total", "source" => name.clone()).increment(1);
            tracing::warn!(source = %name, error = ?e, elapsed_ms, "source failed");
            (false, 0, Some(format!("{e:#}")))
        }
    };
    SourceOutcome {
        name,
        ok,
        articles: count,
        elapsed_ms,
        error,
        metadata: source.metadata(),
    }
}

/// Scrape all sources and merge the results.
///
/// Never fails: a source that errors (or panics) is reported in
/// `FetchReport::sources` and contributes nothing. No dedup happens here.
pub async fn fetch_all(sources: &[DynSource], mode: FetchMode) -> FetchReport {
    crate::metrics::ensure_metrics_described();

    let mut articles = Vec::new();
    let mut outcomes = Vec::with_capacity(sources.len());

    match mode {
        FetchMode::Sequential => {
            for s in sources {
                let r = scrape_one(s.as_ref()).await;
                outcomes.push(settle(s.as_ref(), r, &mut articles));
            }
        }
        FetchMode::Concurrent => {
            let handles: Vec<_> = sources
                .iter()
                .map(|s| {
                    let s = s.clone();
                    tokio::spawn(async move { scrape_one(s.as_ref()).await })
                })
                .collect();

            let joined = futures::future::join_all(handles).await;
            for (s, j) in sources.iter().zip(joined) {
                let r = match j {
                    Ok(r) => r,
                    Err(e) => (Err(anyhow::anyhow!("scrape task failed: {e}")), 0),
                };
                outcomes.push(settle(s.as_ref(), r, &mut articles));
            }
        }
    }

    sort_by_publish_desc(&mut articles);
    FetchReport {
        articles,
        sources: outcomes,
    }
}
