// src/model/enrichment.rs
//! Sparse enrichment overlay produced by the LLM classifier.
//!
//! Every field is optional. `Enrichment::overlay` is the only way enrichment
//! reaches an `Article`, and it only ever touches the fields listed in
//! `EnrichmentField`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrichment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_bullets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_extended: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type_reasoning: Option<String>,

    /// 0.0 ..= 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_reasoning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// -1.0 ..= 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_reasoning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker_sentiments: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker_sentiment_reasoning: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ticker_reasoning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sectors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_reasoning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_reasoning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_map: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_reasoning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,

    /// e.g. "pre_market", "regular", "after_hours", "closed"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_session_reasoning: Option<String>,
}

/// Closed set of enrichment field names accepted from adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentField {
    SummaryShort,
    SummaryBullets,
    SummaryExtended,
    EventType,
    EventTypeReasoning,
    ImportanceScore,
    ImportanceReasoning,
    Sentiment,
    SentimentScore,
    SentimentReasoning,
    TickerSentiments,
    TickerSentimentReasoning,
    Tickers,
    PrimaryTicker,
    PrimaryTickerReasoning,
    Sectors,
    SectorReasoning,
    Industry,
    IndustryReasoning,
    Keywords,
    KeywordMap,
    KeywordReasoning,
    Entities,
    MarketSession,
    MarketSessionReasoning,
}

impl EnrichmentField {
    pub const ALL: [EnrichmentField; 25] = [
        Self::SummaryShort,
        Self::SummaryBullets,
        Self::SummaryExtended,
        Self::EventType,
        Self::EventTypeReasoning,
        Self::ImportanceScore,
        Self::ImportanceReasoning,
        Self::Sentiment,
        Self::SentimentScore,
        Self::SentimentReasoning,
        Self::TickerSentiments,
        Self::TickerSentimentReasoning,
        Self::Tickers,
        Self::PrimaryTicker,
        Self::PrimaryTickerReasoning,
        Self::Sectors,
        Self::SectorReasoning,
        Self::Industry,
        Self::IndustryReasoning,
        Self::Keywords,
        Self::KeywordMap,
        Self::KeywordReasoning,
        Self::Entities,
        Self::MarketSession,
        Self::MarketSessionReasoning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SummaryShort => "summary_short",
            Self::SummaryBullets => "summary_bullets",
            Self::SummaryExtended => "summary_extended",
            Self::EventType => "event_type",
            Self::EventTypeReasoning => "event_type_reasoning",
            Self::ImportanceScore => "importance_score",
            Self::ImportanceReasoning => "importance_reasoning",
            Self::Sentiment => "sentiment",
            Self::SentimentScore => "sentiment_score",
            Self::SentimentReasoning => "sentiment_reasoning",
            Self::TickerSentiments => "ticker_sentiments",
            Self::TickerSentimentReasoning => "ticker_sentiment_reasoning",
            Self::Tickers => "tickers",
            Self::PrimaryTicker => "primary_ticker",
            Self::PrimaryTickerReasoning => "primary_ticker_reasoning",
            Self::Sectors => "sectors",
            Self::SectorReasoning => "sector_reasoning",
            Self::Industry => "industry",
            Self::IndustryReasoning => "industry_reasoning",
            Self::Keywords => "keywords",
            Self::KeywordMap => "keyword_map",
            Self::KeywordReasoning => "keyword_reasoning",
            Self::Entities => "entities",
            Self::MarketSession => "market_session",
            Self::MarketSessionReasoning => "market_session_reasoning",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl Enrichment {
    /// Build an overlay from a loose name -> value map.
    ///
    /// Unknown names are ignored and a value of the wrong shape only drops that
    /// one field, never the whole overlay.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut out = Enrichment::default();
        for (name, value) in fields {
            if value.is_null() {
                continue;
            }
            let Some(field) = EnrichmentField::from_name(&name) else {
                tracing::debug!(field = %name, "ignoring unknown enrichment field");
                continue;
            };
            let mut single = Map::with_capacity(1);
            single.insert(field.as_str().to_string(), value);
            match serde_json::from_value::<Enrichment>(Value::Object(single)) {
                Ok(one) => out.overlay(one),
                Err(e) => {
                    tracing::debug!(field = field.as_str(), error = %e, "dropping malformed enrichment value");
                }
            }
        }
        out
    }

    pub fn has(&self, field: EnrichmentField) -> bool {
        use EnrichmentField as F;
        match field {
            F::SummaryShort => self.summary_short.is_some(),
            F::SummaryBullets => self.summary_bullets.is_some(),
            F::SummaryExtended => self.summary_extended.is_some(),
            F::EventType => self.event_type.is_some(),
            F::EventTypeReasoning => self.event_type_reasoning.is_some(),
            F::ImportanceScore => self.importance_score.is_some(),
            F::ImportanceReasoning => self.importance_reasoning.is_some(),
            F::Sentiment => self.sentiment.is_some(),
            F::SentimentScore => self.sentiment_score.is_some(),
            F::SentimentReasoning => self.sentiment_reasoning.is_some(),
            F::TickerSentiments => self.ticker_sentiments.is_some(),
            F::TickerSentimentReasoning => self.ticker_sentiment_reasoning.is_some(),
            F::Tickers => self.tickers.is_some(),
            F::PrimaryTicker => self.primary_ticker.is_some(),
            F::PrimaryTickerReasoning => self.primary_ticker_reasoning.is_some(),
            F::Sectors => self.sectors.is_some(),
            F::SectorReasoning => self.sector_reasoning.is_some(),
            F::Industry => self.industry.is_some(),
            F::IndustryReasoning => self.industry_reasoning.is_some(),
            F::Keywords => self.keywords.is_some(),
            F::KeywordMap => self.keyword_map.is_some(),
            F::KeywordReasoning => self.keyword_reasoning.is_some(),
            F::Entities => self.entities.is_some(),
            F::MarketSession => self.market_session.is_some(),
            F::MarketSessionReasoning => self.market_session_reasoning.is_some(),
        }
    }

    pub fn present_fields(&self) -> Vec<EnrichmentField> {
        EnrichmentField::ALL
            .into_iter()
            .filter(|f| self.has(*f))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        EnrichmentField::ALL.iter().all(|f| !self.has(*f))
    }

    /// Field-by-field merge: a present value in `other` replaces ours, an absent
    /// one leaves ours untouched.
    pub fn overlay(&mut self, other: Enrichment) {
        macro_rules! take_present {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(v) = other.$field {
                        self.$field = Some(v);
                    }
                )*
            };
        }
        take_present!(
            summary_short,
            summary_bullets,
            summary_extended,
            event_type,
            event_type_reasoning,
            importance_score,
            importance_reasoning,
            sentiment,
            sentiment_score,
            sentiment_reasoning,
            ticker_sentiments,
            ticker_sentiment_reasoning,
            tickers,
            primary_ticker,
            primary_ticker_reasoning,
            sectors,
            sector_reasoning,
            industry,
            industry_reasoning,
            keywords,
            keyword_map,
            keyword_reasoning,
            entities,
            market_session,
            market_session_reasoning,
        );
    }

    /// Clamp scores into range, normalize tickers, and turn blank strings into
    /// absent values so they can never clobber stored data.
    pub fn sanitize(mut self) -> Self {
        self.importance_score = self
            .importance_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));
        self.sentiment_score = self
            .sentiment_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(-1.0, 1.0));

        self.tickers = self.tickers.take().map(normalize_tickers).filter(|v| !v.is_empty());
        self.primary_ticker = self
            .primary_ticker
            .take()
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty());
        self.ticker_sentiments = self.ticker_sentiments.take().and_then(|m| {
            let out: BTreeMap<String, f64> = m
                .into_iter()
                .filter(|(_, s)| s.is_finite())
                .map(|(t, s)| (t.trim().to_ascii_uppercase(), s.clamp(-1.0, 1.0)))
                .filter(|(t, _)| !t.is_empty())
                .collect();
            (!out.is_empty()).then_some(out)
        });

        for list in [
            &mut self.summary_bullets,
            &mut self.sectors,
            &mut self.industry,
            &mut self.keywords,
            &mut self.entities,
        ] {
            *list = list.take().map(clean_list).filter(|v| !v.is_empty());
        }
        self.keyword_map = self.keyword_map.take().and_then(|m| {
            let out: BTreeMap<String, Vec<String>> = m
                .into_iter()
                .map(|(k, v)| (k.trim().to_string(), clean_list(v)))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect();
            (!out.is_empty()).then_some(out)
        });

        for s in [
            &mut self.summary_short,
            &mut self.summary_extended,
            &mut self.event_type,
            &mut self.event_type_reasoning,
            &mut self.importance_reasoning,
            &mut self.sentiment_reasoning,
            &mut self.primary_ticker_reasoning,
            &mut self.sector_reasoning,
            &mut self.industry_reasoning,
            &mut self.keyword_reasoning,
            &mut self.market_session,
            &mut self.market_session_reasoning,
        ] {
            if s.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *s = None;
            }
        }
        self
    }
}

/// Trimmed items, blanks dropped.
fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_tickers(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for t in items {
        let t = t.trim().to_ascii_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_never_clobbers_with_absent() {
        let mut base = Enrichment {
            summary_short: Some("kept".into()),
            sentiment: Some(Sentiment::Negative),
            ..Default::default()
        };
        base.overlay(Enrichment {
            sentiment: Some(Sentiment::Positive),
            tickers: Some(vec!["MSFT".into()]),
            ..Default::default()
        });
        assert_eq!(base.summary_short.as_deref(), Some("kept"));
        assert_eq!(base.sentiment, Some(Sentiment::Positive));
        assert_eq!(base.tickers, Some(vec!["MSFT".to_string()]));
    }

    #[test]
    fn from_fields_ignores_unknown_and_malformed() {
        let raw = json!({
            "url": "https://evil.test",
            "title": "overwritten?",
            "sentiment": "neutral",
            "importance_score": "very",
            "tickers": ["aapl"],
            "summary_short": null,
        });
        let Value::Object(map) = raw else { unreachable!() };
        let e = Enrichment::from_fields(map);
        assert_eq!(e.sentiment, Some(Sentiment::Neutral));
        assert_eq!(e.importance_score, None);
        assert_eq!(e.tickers, Some(vec!["aapl".to_string()]));
        assert_eq!(e.summary_short, None);
        assert_eq!(
            e.present_fields(),
            vec![EnrichmentField::Sentiment, EnrichmentField::Tickers]
        );
    }

    #[test]
    fn sanitize_clamps_and_normalizes() {
        let e = Enrichment {
            importance_score: Some(1.7),
            sentiment_score: Some(-3.0),
            tickers: Some(vec![" aapl ".into(), "AAPL".into(), "".into()]),
            primary_ticker: Some("  ".into()),
            summary_short: Some(" ".into()),
            ..Default::default()
        }
        .sanitize();
        assert_eq!(e.importance_score, Some(1.0));
        assert_eq!(e.sentiment_score, Some(-1.0));
        assert_eq!(e.tickers, Some(vec!["AAPL".to_string()]));
        assert_eq!(e.primary_ticker, None);
        assert_eq!(e.summary_short, None);
    }

    #[test]
    fn sanitize_drops_blank_list_items() {
        let e = Enrichment {
            summary_bullets: Some(vec![" Beat on revenue ".into(), "  ".into()]),
            sectors: Some(vec!["".into(), " ".into()]),
            industry: Some(vec![]),
            keywords: Some(vec!["earnings".into(), "".into()]),
            entities: Some(vec!["\t".into()]),
            keyword_map: Some(BTreeMap::from([
                ("companies".to_string(), vec![" Apple".to_string(), "".to_string()]),
                ("people".to_string(), vec![" ".to_string()]),
            ])),
            ..Default::default()
        }
        .sanitize();
        assert_eq!(e.summary_bullets, Some(vec!["Beat on revenue".to_string()]));
        assert_eq!(e.sectors, None);
        assert_eq!(e.industry, None);
        assert_eq!(e.keywords, Some(vec!["earnings".to_string()]));
        assert_eq!(e.entities, None);
        let km = e.keyword_map.unwrap();
        assert_eq!(km.len(), 1);
        assert_eq!(km["companies"], vec!["Apple".to_string()]);
    }

    #[test]
    fn field_names_round_trip() {
        for f in EnrichmentField::ALL {
            assert_eq!(EnrichmentField::from_name(f.as_str()), Some(f));
        }
        assert!(EnrichmentField::from_name("url").is_none());
    }
}
