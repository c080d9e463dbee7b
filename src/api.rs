// src/api.rs
//! HTTP trigger surface. `POST /run` is what the scheduler hits; a duplicate
//! trigger is harmless because inserts are insert-if-absent.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::model::PipelineRun;
use crate::pipeline::{BackfillOptions, BackfillReport, Pipeline};
use crate::store::ArticleFilter;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/run", post(run_pipeline))
        .route("/backfill", post(run_backfill))
        .route("/runs", get(recent_runs))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Run one live pass and map the outcome to an HTTP-style status.
pub async fn trigger_run(pipeline: &Pipeline) -> (StatusCode, String) {
    tracing::info!("trigger received: running article pipeline");
    match pipeline.run().await {
        Ok(run) => {
            tracing::info!(run_id = %run.run_id, "article pipeline run completed");
            (StatusCode::OK, "ok".to_string())
        }
        Err(e) => {
            tracing::error!(error = ?e, "error during article pipeline run");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e:#}"))
        }
    }
}

async fn run_pipeline(State(state): State<AppState>) -> (StatusCode, String) {
    trigger_run(&state.pipeline).await
}

/// Every field optional; missing ones fall back to the configured backfill settings.
/// No body at all runs the configured defaults as-is.
#[derive(Debug, Default, Deserialize)]
struct BackfillReq {
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    max_workers: Option<usize>,
    #[serde(default)]
    per_call_timeout_ms: Option<u64>,
    #[serde(default)]
    limit_total: Option<usize>,
    #[serde(default)]
    filter: Option<ArticleFilter>,
}

async fn run_backfill(
    State(state): State<AppState>,
    body: Option<Json<BackfillReq>>,
) -> Result<Json<BackfillReport>, (StatusCode, String)> {
    let report = match body {
        None => state.pipeline.backfill_default().await,
        Some(Json(req)) => state.pipeline.backfill(backfill_options(&state, req)).await,
    };
    report.map(Json).map_err(|e| {
        tracing::error!(error = ?e, "backfill failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e:#}"))
    })
}

fn backfill_options(state: &AppState, req: BackfillReq) -> BackfillOptions {
    let mut opts = BackfillOptions::from(&state.pipeline.config().backfill);
    if let Some(v) = req.batch_size {
        opts.batch_size = v.max(1);
    }
    if let Some(v) = req.max_workers {
        opts.max_workers = v.clamp(1, 64);
    }
    if req.per_call_timeout_ms.is_some() {
        opts.per_call_timeout_ms = req.per_call_timeout_ms;
    }
    if req.limit_total.is_some() {
        opts.limit_total = req.limit_total;
    }
    if let Some(f) = req.filter {
        opts.filter = f;
    }
    opts
}

#[derive(Debug, Deserialize)]
struct RunsQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn recent_runs(
    State(state): State<AppState>,
    Query(q): Query<RunsQuery>,
) -> Result<Json<Vec<PipelineRun>>, (StatusCode, String)> {
    let limit = q.limit.unwrap_or(20).clamp(1, 500);
    state
        .pipeline
        .store()
        .recent_runs(limit)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e:#}")))
}
