// src/model/mod.rs
pub mod article;
pub mod enrichment;
pub mod run;

pub use article::{parse_publish_date, sort_by_publish_desc, Article, ArticleId};
pub use enrichment::{Enrichment, EnrichmentField, Sentiment};
pub use run::{EnrichmentCounts, PipelineRun, RunConfigSnapshot, RunId, RunStatus, SourceOutcome};
