use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::classifier::RegimeResult;
use crate::governance::RiskAssessment;

/// Which upstream answered for a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Binance,
    Yahoo,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Yahoo => "yahoo",
        }
    }
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PriceSource {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "yahoo" | "yfinance" => Ok(Self::Yahoo),
            _ => Err("invalid price source; expected binance|yahoo"),
        }
    }
}

/// One price observation, produced once per fetch cycle per asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetQuote {
    pub asset: String,
    pub price: f64,
    pub source: PriceSource,
    pub timestamp: DateTime<Utc>,
}

/// Persisted unit: a quote annotated with the regime that classified it.
/// Append-only; rows are never updated in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub asset: String,
    pub price: f64,
    pub source: PriceSource,
    pub timestamp: DateTime<Utc>,
    pub regime: String,
    pub z_score: f64,
}

impl TelemetryRecord {
    pub fn from_quote(quote: &AssetQuote, result: &RegimeResult) -> Self {
        Self {
            asset: quote.asset.clone(),
            price: quote.price,
            source: quote.source,
            timestamp: quote.timestamp,
            regime: result.regime.as_str().to_string(),
            z_score: result.z_score,
        }
    }
}

/// Externally produced sentiment scalar, clamped to [-1.0, 1.0]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SentimentSample {
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl SentimentSample {
    pub fn new(score: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            score: score.clamp(-1.0, 1.0),
            timestamp,
        }
    }

    /// Fallback sample when the sentiment source is unavailable
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self {
            score: 0.0,
            timestamp,
        }
    }
}

/// Persisted unit for the sentiment/governance sentinel loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelRecord {
    pub timestamp: DateTime<Utc>,
    pub z_score: f64,
    pub sentiment: f64,
    pub state: String,
    pub governance: String,
    pub anomaly_counter: i32,
}

impl SentinelRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        result: &RegimeResult,
        sentiment: &SentimentSample,
        assessment: &RiskAssessment,
    ) -> Self {
        Self {
            timestamp,
            z_score: result.z_score,
            sentiment: sentiment.score,
            state: result.regime.as_str().to_string(),
            governance: assessment.verdict.to_string(),
            anomaly_counter: assessment.anomaly_counter as i32,
        }
    }
}
