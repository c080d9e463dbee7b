// tests/api_http.rs
//
// HTTP-level tests for the trigger Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - POST /run      (success and persist failure)
// - POST /backfill (no body, config defaults and body overrides)
// - GET  /runs
mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use common::{articles, enricher, neutral, pipeline, FlakyStore};
use finnews_pipeline::enrich::StaticSummarizer;
use finnews_pipeline::ingest::providers::StaticSource;
use finnews_pipeline::store::{DynStore, MemoryStore};
use finnews_pipeline::{router, AppState, Pipeline, PipelineConfig};

const BODY_LIMIT: usize = 1024 * 1024;

fn fed_pipeline(store: DynStore) -> Pipeline {
    pipeline(
        PipelineConfig::default(),
        vec![Arc::new(StaticSource::new("Fed", articles("fed", 3)))],
        Some(enricher(StaticSummarizer::new(neutral()))),
        store,
    )
}

fn app_with(p: Pipeline) -> (Router, AppState) {
    let state = AppState::new(p);
    (router(state.clone()), state)
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    String::from_utf8(bytes).expect("utf8")
}

fn post_json(uri: &str, v: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(v.to_string()))
        .expect("build POST")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = app_with(fed_pipeline(Arc::new(MemoryStore::new())));
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "ok");
}

#[tokio::test]
async fn run_returns_200_and_persists() {
    let store = Arc::new(MemoryStore::new());
    let (app, _) = app_with(fed_pipeline(store.clone()));

    let req = Request::builder()
        .method("POST")
        .uri("/run")
        .body(Body::empty())
        .expect("build POST /run");
    let resp = app.oneshot(req).await.expect("oneshot /run");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "ok");
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn run_returns_500_with_message_on_persist_failure() {
    let (app, _) = app_with(fed_pipeline(Arc::new(FlakyStore::failing_inserts())));

    let req = Request::builder()
        .method("POST")
        .uri("/run")
        .body(Body::empty())
        .expect("build POST /run");
    let resp = app.oneshot(req).await.expect("oneshot /run");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(resp).await;
    assert!(body.starts_with("error: "), "body was {body:?}");
    assert!(body.contains("disk full"));
}

#[tokio::test]
async fn backfill_reports_counts_and_honours_overrides() {
    let store = Arc::new(MemoryStore::new());
    let (app, state) = app_with(fed_pipeline(store.clone()));
    state.pipeline.run().await.unwrap();

    let resp = app
        .clone()
        .oneshot(post_json("/backfill", json!({ "batch_size": 2 })))
        .await
        .expect("oneshot /backfill");
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Json = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(v["processed"], 3);
    assert_eq!(v["updated"], 3);
    assert_eq!(v["pages"], 2);

    let resp = app
        .oneshot(post_json("/backfill", json!({ "limit_total": 1 })))
        .await
        .expect("oneshot /backfill");
    let v: Json = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(v["processed"], 1);
}

#[tokio::test]
async fn backfill_without_body_uses_configured_defaults() {
    let store = Arc::new(MemoryStore::new());
    let cfg = PipelineConfig {
        backfill: finnews_pipeline::config::BackfillSettings {
            batch_size: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let p = pipeline(
        cfg,
        vec![Arc::new(StaticSource::new("Fed", articles("fed", 3)))],
        Some(enricher(StaticSummarizer::new(neutral()))),
        store,
    );
    let (app, state) = app_with(p);
    state.pipeline.run().await.unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/backfill")
        .body(Body::empty())
        .expect("build POST /backfill");
    let resp = app.oneshot(req).await.expect("oneshot /backfill");
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Json = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(v["processed"], 3);
    assert_eq!(v["pages"], 3);
}

#[tokio::test]
async fn backfill_without_enricher_is_500() {
    let p = pipeline(
        PipelineConfig::default(),
        vec![],
        None,
        Arc::new(MemoryStore::new()),
    );
    let (app, _) = app_with(p);
    let resp = app
        .oneshot(post_json("/backfill", json!({})))
        .await
        .expect("oneshot /backfill");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn runs_lists_most_recent_first() {
    let (app, state) = app_with(fed_pipeline(Arc::new(MemoryStore::new())));
    let first = state.pipeline.run().await.unwrap();
    let second = state.pipeline.run().await.unwrap();

    let req = Request::builder()
        .uri("/runs?limit=1")
        .body(Body::empty())
        .expect("build GET /runs");
    let resp = app.oneshot(req).await.expect("oneshot /runs");
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Json = serde_json::from_str(&body_string(resp).await).unwrap();
    let runs = v.as_array().expect("array");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["run_id"], second.run_id.to_string());
    assert_ne!(runs[0]["run_id"], first.run_id.to_string());
    assert_eq!(runs[0]["status"], "success");
    assert_eq!(runs[0]["articles_inserted"], 0);
}
