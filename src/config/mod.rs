// src/config/mod.rs
pub mod ai;
pub mod pipeline;

pub use ai::AiConfig;
pub use pipeline::{
    BackfillSettings, EnrichmentSettings, PipelineConfig, SourceSettings, StoreSettings,
    DEFAULT_PIPELINE_CONFIG_JSON, DEFAULT_PIPELINE_CONFIG_TOML, ENV_PIPELINE_CONFIG_PATH,
};
