// src/enrich/openai.rs
//! OpenAI-compatible chat-completions summarizer.
//!
//! The model is asked for one JSON object with the enrichment field names;
//! list-shaped parts (per-ticker sentiment, keyword groups) are folded into the
//! map fields articles carry.

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::adapter::EnrichmentAdapter;
use crate::config::ai::AiConfig;
use crate::ingest::truncate_chars;
use crate::model::{Article, Enrichment};

const MAX_CONTENT_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You are a precise financial news assistant.\n\
You MUST respond with a single valid JSON object and nothing else.\n\
If a field is unknown, use null or an empty list as appropriate.\n\
Fields: summary_short (one sentence), summary_bullets (3-5 strings), summary_extended (one paragraph), \
event_type, event_type_reasoning, importance_score (0..1), importance_reasoning, \
sentiment (positive|negative|neutral), sentiment_score (-1..1), sentiment_reasoning, \
tickers (uppercase symbols), primary_ticker, primary_ticker_reasoning, sectors, sector_reasoning, \
industry, industry_reasoning, keywords, keyword_groups ([{category, items}]), keyword_reasoning, \
entities, market_session (pre_market|regular|after_hours|closed), market_session_reasoning, \
ticker_sentiment_items ([{ticker, score, reasoning}]).";

#[derive(Debug, Clone, Deserialize)]
struct TickerSentiment {
    ticker: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct KeywordGroup {
    category: String,
    #[serde(default)]
    items: Vec<String>,
}

/// Decode the model's JSON object into an overlay.
///
/// `ticker_sentiment_items` and `keyword_groups` are folded into the map-shaped
/// fields; everything else goes through `Enrichment::from_fields`, so a value of
/// the wrong type drops only that field (or that list item).
pub fn parse_reply(json: &str) -> Result<Enrichment> {
    let mut fields: Map<String, Value> =
        serde_json::from_str(json).context("llm output is not a JSON object")?;

    let ticker_items = fields.remove("ticker_sentiment_items");
    let keyword_groups = fields.remove("keyword_groups");
    if let Some(Value::String(label)) = fields.get_mut("sentiment") {
        *label = label.trim().to_ascii_lowercase();
    }

    let mut out = Enrichment::from_fields(fields);

    let mut ticker_sentiments = BTreeMap::new();
    let mut ticker_sentiment_reasoning = BTreeMap::new();
    for it in list_items::<TickerSentiment>(ticker_items) {
        let t = it.ticker.trim().to_ascii_uppercase();
        if t.is_empty() {
            continue;
        }
        if let Some(score) = it.score {
            ticker_sentiments.insert(t.clone(), score);
        }
        if let Some(r) = it.reasoning.filter(|r| !r.trim().is_empty()) {
            ticker_sentiment_reasoning.insert(t, r);
        }
    }

    let mut keyword_map = BTreeMap::new();
    for g in list_items::<KeywordGroup>(keyword_groups) {
        let cat = g.category.trim();
        if !cat.is_empty() {
            keyword_map.insert(cat.to_string(), g.items);
        }
    }

    out.overlay(Enrichment {
        ticker_sentiments: (!ticker_sentiments.is_empty()).then_some(ticker_sentiments),
        ticker_sentiment_reasoning: (!ticker_sentiment_reasoning.is_empty())
            .then_some(ticker_sentiment_reasoning),
        keyword_map: (!keyword_map.is_empty()).then_some(keyword_map),
        ..Default::default()
    });
    Ok(out.sanitize())
}

/// Items of a JSON array that decode as `T`; anything else is skipped.
fn list_items<T: DeserializeOwned>(value: Option<Value>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Strip code fences some models wrap JSON in.
fn extract_json(content: &str) -> &str {
    let t = content.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiSummarizer {
    pub fn from_config(cfg: &AiConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            bail!("missing API key for provider {}", cfg.provider);
        }
        let http = reqwest::Client::builder()
            .user_agent("finnews-pipeline/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.request_timeout_secs.max(1)))
            .build()
            .context("building llm http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
        })
    }

    fn user_payload(article: &Article) -> serde_json::Value {
        let content = truncate_chars(article.content.trim(), MAX_CONTENT_CHARS);
        serde_json::json!({
            "title": article.title,
            "content": content,
            "publish_date": article.publish_date.as_deref().unwrap_or(""),
            "url": article.url,
            "authors": article.authors.clone().unwrap_or_default(),
            "source": article.source,
        })
    }
}

#[async_trait::async_trait]
impl EnrichmentAdapter for OpenAiSummarizer {
    async fn summarize(&self, article: &Article) -> Result<Option<Enrichment>> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let payload = serde_json::to_string_pretty(&Self::user_payload(article))?;
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &payload,
                },
            ],
            temperature: 0.1,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("llm request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("llm returned HTTP {status}"));
        }
        let body: Resp = resp.json().await.context("decoding llm response")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let json = extract_json(&content);
        if json.is_empty() {
            return Ok(None);
        }
        let enrichment = parse_reply(json)?;
        Ok((!enrichment.is_empty()).then_some(enrichment))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
