//! Financial news pipeline: binary entrypoint.
//! Boots the Axum trigger server (`/run`, `/backfill`, `/runs`, `/metrics`).

use finnews_pipeline::{
    build_pipeline, metrics::Metrics, router, telemetry, AppState, PipelineConfig,
};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = PipelineConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let pipeline = build_pipeline(cfg).map_err(shuttle_runtime::Error::Custom)?;
    let metrics = Metrics::init().map_err(shuttle_runtime::Error::Custom)?;

    let app = router(AppState::new(pipeline)).merge(metrics.router());

    tracing::info!("finnews pipeline ready");
    Ok(app.into())
}
