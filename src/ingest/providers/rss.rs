// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::ingest::normalize_text;
use crate::ingest::types::SourceAdapter;
use crate::model::Article;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator")]
    dc_creator: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct ScrapeStats {
    items_seen: usize,
    kept: usize,
    skipped: usize,
    elapsed_ms: u64,
    last_error: Option<String>,
}

/// Generic RSS 2.0 source. One instance per feed.
pub struct RssSource {
    name: String,
    limit: usize,
    mode: Mode,
    stats: Mutex<ScrapeStats>,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssSource {
    pub fn from_url(name: impl Into<String>, url: impl Into<String>, limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("finnews-pipeline/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building rss http client")?;
        Ok(Self::with_mode(
            name.into(),
            limit,
            Mode::Http {
                url: url.into(),
                client,
            },
        ))
    }

    pub fn from_fixture(name: impl Into<String>, xml: &str, limit: usize) -> Self {
        Self::with_mode(name.into(), limit, Mode::Fixture(xml.to_string()))
    }

    fn with_mode(name: String, limit: usize, mode: Mode) -> Self {
        Self {
            name,
            limit: limit.max(1),
            mode,
            stats: Mutex::new(ScrapeStats::default()),
        }
    }

    fn parse_items(&self, xml: &str) -> Result<(Vec<Article>, ScrapeStats)> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml for {}", self.name))?;

        let mut stats = ScrapeStats {
            items_seen: rss.channel.item.len(),
            ..Default::default()
        };
        let mut out = Vec::with_capacity(self.limit.min(rss.channel.item.len()));
        for it in rss.channel.item {
            if out.len() >= self.limit {
                break;
            }
            let Some(url) = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
                stats.skipped += 1;
                continue;
            };
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let content = normalize_text(it.description.as_deref().unwrap_or_default());
            if title.is_empty() && content.is_empty() {
                stats.skipped += 1;
                continue;
            }
            let authors = it
                .author
                .or(it.dc_creator)
                .map(|a| normalize_text(&a))
                .filter(|a| !a.is_empty())
                .map(|a| vec![a]);

            out.push(Article {
                url,
                title,
                content,
                publish_date: it.pub_date.map(|d| d.trim().to_string()),
                authors,
                source: Some(self.name.clone()),
                ..Default::default()
            });
        }
        stats.kept = out.len();
        Ok((out, stats))
    }

    async fn load_body(&self) -> Result<String> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.name))?
                    .error_for_status()
                    .with_context(|| format!("{} http status", self.name))?;
                resp.text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for RssSource {
    async fn scrape(&self) -> Result<Vec<Article>> {
        let t0 = Instant::now();
        let res = match self.load_body().await {
            Ok(body) => self.parse_items(&body),
            Err(e) => Err(e),
        };
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        let mut guard = self.stats.lock().expect("rss stats poisoned");
        match res {
            Ok((articles, mut stats)) => {
                stats.elapsed_ms = elapsed_ms;
                counter!("rss_items_total", "source" => self.name.clone())
                    .increment(stats.items_seen as u64);
                *guard = stats;
                Ok(articles)
            }
            Err(e) => {
                *guard = ScrapeStats {
                    elapsed_ms,
                    last_error: Some(format!("{e:#}")),
                    ..Default::default()
                };
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Map<String, Value> {
        let s = self.stats.lock().expect("rss stats poisoned").clone();
        let mut m = Map::new();
        m.insert("limit".into(), json!(self.limit));
        m.insert("items_seen".into(), json!(s.items_seen));
        m.insert("kept".into(), json!(s.kept));
        m.insert("skipped".into(), json!(s.skipped));
        m.insert("scrape_ms".into(), json!(s.elapsed_ms));
        if let Some(e) = s.last_error {
            m.insert("last_error".into(), json!(e));
        }
        m
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
