// src/model/article.rs
//! Article record: base fields scraped from a source plus the flattened
//! enrichment overlay.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::enrichment::Enrichment;
use super::run::RunId;

/// Store-assigned identity. Strictly increasing in insertion order, so it doubles
/// as the forward pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub u64);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ArticleId>,
    pub url: String,
    pub title: String,
    pub content: String,
    /// Source-supplied, format varies per source (RFC 2822, RFC 3339, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Short summary some sources ship with the article itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub enrichment: Enrichment,
}

impl Article {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_publish_date(mut self, ts: impl Into<String>) -> Self {
        self.publish_date = Some(ts.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Overlay enrichment fields onto this article. Present overlay values win,
    /// absent ones keep what is already there.
    pub fn merge_enrichment(&mut self, overlay: Enrichment) {
        self.enrichment.overlay(overlay);
    }

    pub fn merged(mut self, overlay: Enrichment) -> Self {
        self.merge_enrichment(overlay);
        self
    }

    pub fn is_enriched(&self) -> bool {
        !self.enrichment.is_empty()
    }

    /// Parsed publish timestamp used for ordering; `None` when missing or unparseable.
    pub fn publish_sort_key(&self) -> Option<DateTime<Utc>> {
        self.publish_date.as_deref().and_then(parse_publish_date)
    }
}

/// Parse the heterogeneous publish dates sources hand us.
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // "2025-11-07 00:53:38+00:00" and friends
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Newest first; articles without a usable timestamp go last.
pub fn sort_by_publish_desc(articles: &mut [Article]) {
    articles.sort_by_cached_key(|a| std::cmp::Reverse(a.publish_sort_key()));
}
