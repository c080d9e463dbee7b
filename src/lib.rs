// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod enrich;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::bootstrap::build_pipeline;
pub use crate::config::PipelineConfig;
pub use crate::pipeline::{BackfillOptions, BackfillReport, Pipeline, PipelineDeps};
