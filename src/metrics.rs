// src/metrics.rs
//! Metric names used across the pipeline and the Prometheus exporter behind
//! `GET /metrics`.
use anyhow::Context;
use axum::{extract::State, routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Register descriptions once per process. Cheap to call from every entry point.
pub fn ensure_metrics_described() {
    static DESCRIBED: OnceCell<()> = OnceCell::new();
    DESCRIBED.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Live pipeline runs by final status.");
        describe_histogram!("pipeline_run_duration_ms", "Live run wall time in milliseconds.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the live pipeline last finished.");
        describe_counter!("fetch_articles_total", "Articles returned by each source.");
        describe_counter!("fetch_source_errors_total", "Source scrape failures.");
        describe_histogram!("fetch_source_ms", "Per-source scrape time in milliseconds.");
        describe_counter!("rss_items_total", "Raw RSS items seen per feed.");
        describe_counter!("enrich_updated_total", "Articles successfully enriched.");
        describe_counter!("enrich_failed_total", "Enrichment failures by reason.");
        describe_counter!("store_inserted_total", "Articles newly inserted by live runs.");
    });
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;
        ensure_metrics_described();
        tracing::info!("prometheus recorder installed");
        Ok(Self { handle })
    }

    /// Current exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .with_state(self.clone())
    }
}

async fn scrape(State(m): State<Metrics>) -> String {
    m.render()
}
