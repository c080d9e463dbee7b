// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::ai::AiConfig;
use crate::enrich::DEFAULT_MAX_WORKERS;
use crate::ingest::types::FetchMode;

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_PIPELINE_CONFIG_TOML: &str = "config/pipeline.toml";
pub const DEFAULT_PIPELINE_CONFIG_JSON: &str = "config/pipeline.json";

fn default_article_limit() -> usize {
    20
}
fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}
fn default_batch_size() -> usize {
    1000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub per_call_timeout_ms: Option<u64>,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            per_call_timeout_ms: None,
        }
    }
}

impl EnrichmentSettings {
    pub fn per_call_timeout(&self) -> Option<Duration> {
        self.per_call_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub per_call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub limit_total: Option<usize>,
    #[serde(default)]
    pub only_unenriched: bool,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            per_call_timeout_ms: None,
            limit_total: None,
            only_unenriched: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// JSON snapshot path; in-memory store when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub name: String,
    pub url: String,
    /// Overrides the global `article_limit` for this source.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Articles requested per source.
    #[serde(default = "default_article_limit")]
    pub article_limit: usize,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    /// Run the enrichment stage between fetch and insert.
    #[serde(default)]
    pub enrich_on_ingest: bool,
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
    #[serde(default)]
    pub backfill: BackfillSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            article_limit: default_article_limit(),
            fetch_mode: FetchMode::default(),
            enrich_on_ingest: false,
            enrichment: EnrichmentSettings::default(),
            backfill: BackfillSettings::default(),
            store: StoreSettings::default(),
            ai: AiConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_PIPELINE_CONFIG_PATH} points to non-existent path"));
            }
        }
        for p in [DEFAULT_PIPELINE_CONFIG_TOML, DEFAULT_PIPELINE_CONFIG_JSON] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Self::default().finish()
    }

    fn finish(self) -> Result<Self> {
        let mut cfg = self.sanitized();
        cfg.ai = cfg.ai.resolve()?;
        Ok(cfg)
    }

    /// Clamp values that would make the pipeline stall or fan out unbounded.
    pub fn sanitized(mut self) -> Self {
        self.article_limit = self.article_limit.max(1);
        self.enrichment.max_workers = self.enrichment.max_workers.clamp(1, 64);
        self.backfill.max_workers = self.backfill.max_workers.clamp(1, 64);
        self.backfill.batch_size = self.backfill.batch_size.max(1);
        self.enrichment.per_call_timeout_ms = self.enrichment.per_call_timeout_ms.filter(|ms| *ms > 0);
        self.backfill.per_call_timeout_ms = self.backfill.per_call_timeout_ms.filter(|ms| *ms > 0);
        self.sources.retain(|s| !s.name.trim().is_empty() && !s.url.trim().is_empty());
        self
    }

    pub fn active_sources(&self) -> impl Iterator<Item = &SourceSettings> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn source_limit(&self, s: &SourceSettings) -> usize {
        s.limit.unwrap_or(self.article_limit).max(1)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            // Unknown extension: JSON first, then TOML.
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported pipeline config format: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_and_json_parse_to_same_shape() {
        let toml = r#"
article_limit = 5
fetch_mode = "sequential"
enrich_on_ingest = true

[enrichment]
max_workers = 0
per_call_timeout_ms = 1500

[[sources]]
name = "Fed"
url = "https://www.federalreserve.gov/feeds/press_all.xml"

[[sources]]
name = ""
url = "https://dropped.test"
"#;
        let t = parse_config(toml, "toml").unwrap().sanitized();
        assert_eq!(t.article_limit, 5);
        assert_eq!(t.fetch_mode, FetchMode::Sequential);
        assert_eq!(t.enrichment.max_workers, 1);
        assert_eq!(t.enrichment.per_call_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(t.sources.len(), 1);
        assert_eq!(t.source_limit(&t.sources[0]), 5);

        let json = r#"{"article_limit": 5, "fetch_mode": "concurrent", "sources": []}"#;
        let j = parse_config(json, "").unwrap();
        assert_eq!(j.fetch_mode, FetchMode::Concurrent);
        assert_eq!(j.backfill.batch_size, 1000);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PIPELINE_CONFIG_PATH);

        // Nothing on disk → defaults
        let d = PipelineConfig::load_default().unwrap();
        assert_eq!(d.article_limit, 20);
        assert!(d.sources.is_empty());

        // Env wins
        let p_json = tmp.path().join("custom.json");
        fs::write(&p_json, r#"{"article_limit": 3}"#).unwrap();
        env::set_var(ENV_PIPELINE_CONFIG_PATH, p_json.display().to_string());
        assert_eq!(PipelineConfig::load_default().unwrap().article_limit, 3);

        env::set_var(ENV_PIPELINE_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(PipelineConfig::load_default().is_err());
        env::remove_var(ENV_PIPELINE_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
