// tests/ingest_fetch.rs
//
// Multi-source fetch: failure isolation, ordering, and the RSS adapter.
mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::article;
use finnews_pipeline::ingest::fetch_all;
use finnews_pipeline::ingest::providers::{RssSource, StaticSource};
use finnews_pipeline::ingest::types::{DynSource, FetchMode, SourceAdapter};
use finnews_pipeline::model::Article;

struct Panicking;

#[async_trait::async_trait]
impl SourceAdapter for Panicking {
    async fn scrape(&self) -> Result<Vec<Article>> {
        panic!("parser blew up");
    }

    fn name(&self) -> &str {
        "Panicking"
    }
}

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Wire</title>
    <item>
      <title>Fed holds rates &amp; signals patience</title>
      <link>https://wire.test/fed-holds</link>
      <pubDate>Tue, 02 Jan 2024 15:00:00 +0000</pubDate>
      <description>&lt;p&gt;Policy makers kept the target range&nbsp;unchanged.&lt;/p&gt;</description>
      <author>Jane Roe</author>
    </item>
    <item>
      <title>No link here</title>
      <description>dropped</description>
    </item>
    <item>
      <title>Oil slips</title>
      <link>https://wire.test/oil</link>
      <pubDate>Mon, 01 Jan 2024 09:30:00 +0000</pubDate>
      <description>Crude eased overnight.</description>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn failing_and_panicking_sources_are_isolated() {
    for mode in [FetchMode::Concurrent, FetchMode::Sequential] {
        let sources: Vec<DynSource> = vec![
            Arc::new(StaticSource::new("A", vec![article("a", 1), article("a", 2)])),
            Arc::new(StaticSource::failing("B", "503 from upstream")),
            Arc::new(Panicking),
            Arc::new(StaticSource::new("C", vec![article("c", 3)])),
        ];
        let report = fetch_all(&sources, mode).await;

        assert_eq!(report.articles.len(), 3, "{mode:?}");
        assert_eq!(report.sources.len(), 4);
        assert_eq!(report.failed_sources(), 2);
        let names: Vec<&str> = report.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "Panicking", "C"], "outcomes follow source order");
        let p = &report.sources[2];
        assert!(!p.ok);
        assert!(p.error.as_deref().unwrap().contains("parser blew up"));
    }
}

#[tokio::test]
async fn merged_batch_is_newest_first_with_undated_last() {
    let undated = Article::new("https://news.test/undated", "t", "c");
    let garbage = Article::new("https://news.test/garbage", "t", "c").with_publish_date("soon");
    let sources: Vec<DynSource> = vec![
        Arc::new(StaticSource::new(
            "A",
            vec![undated, article("a", 5), article("a", 1)],
        )),
        Arc::new(StaticSource::new("B", vec![article("b", 9), garbage])),
    ];
    let report = fetch_all(&sources, FetchMode::Concurrent).await;
    let urls: Vec<&str> = report.articles.iter().map(|a| a.url.as_str()).collect();

    assert_eq!(
        &urls[..3],
        [
            "https://news.test/b/9",
            "https://news.test/a/5",
            "https://news.test/a/1"
        ]
    );
    assert!(urls[3..].contains(&"https://news.test/undated"));
    assert!(urls[3..].contains(&"https://news.test/garbage"));
}

#[tokio::test]
async fn fetch_does_not_dedup() {
    let sources: Vec<DynSource> = vec![
        Arc::new(StaticSource::new("A", vec![article("x", 1)])),
        Arc::new(StaticSource::new("B", vec![article("x", 1)])),
    ];
    let report = fetch_all(&sources, FetchMode::Concurrent).await;
    assert_eq!(report.articles.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_mode_overlaps_slow_sources() {
    let sources: Vec<DynSource> = (0..4)
        .map(|i| {
            Arc::new(
                StaticSource::new(format!("S{i}"), vec![article("s", i)])
                    .with_delay(Duration::from_secs(5)),
            ) as DynSource
        })
        .collect();
    let t0 = tokio::time::Instant::now();
    let report = fetch_all(&sources, FetchMode::Concurrent).await;
    assert_eq!(report.articles.len(), 4);
    assert!(t0.elapsed() < Duration::from_secs(10), "sources should run in parallel");
}

#[tokio::test]
async fn rss_fixture_flows_through_fetch() {
    let sources: Vec<DynSource> = vec![Arc::new(RssSource::from_fixture("Wire", FEED, 10))];
    let report = fetch_all(&sources, FetchMode::Concurrent).await;

    assert_eq!(report.articles.len(), 2, "item without link is skipped");
    let first = &report.articles[0];
    assert_eq!(first.url, "https://wire.test/fed-holds");
    assert_eq!(first.title, "Fed holds rates & signals patience");
    assert_eq!(first.content, "Policy makers kept the target range unchanged.");
    assert_eq!(first.source.as_deref(), Some("Wire"));
    assert_eq!(first.authors.as_deref(), Some(&["Jane Roe".to_string()][..]));

    let meta = &report.sources[0].metadata;
    assert_eq!(meta["items_seen"], 3);
    assert_eq!(meta["kept"], 2);
    assert_eq!(meta["skipped"], 1);
}

#[tokio::test]
async fn rss_limit_caps_kept_items() {
    let src = RssSource::from_fixture("Wire", FEED, 1);
    let got = src.scrape().await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].url, "https://wire.test/fed-holds");
}
