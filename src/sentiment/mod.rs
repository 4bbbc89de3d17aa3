//! Sentiment source boundary
//!
//! The natural-language model that turns headlines into a scalar lives
//! outside this process; the core only needs "return current sentiment in a
//! bounded range". Absence or failure substitutes a neutral sample instead of
//! blocking the governance cycle.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::domain::SentimentSample;
use crate::error::Result;

#[async_trait]
pub trait SentimentSource: Send + Sync {
    /// Current sentiment scalar on a signed scale (clamped to [-1, 1] by the
    /// caller); near-zero means no strong narrative either way
    async fn current_score(&self) -> Result<f64>;
}

/// Fetch a sample, substituting neutral on any failure. No retry at this
/// boundary.
pub async fn sample_or_neutral(source: &dyn SentimentSource) -> SentimentSample {
    let now = Utc::now();
    match source.current_score().await {
        Ok(score) => SentimentSample::new(score, now),
        Err(e) => {
            warn!(error = %e, "sentiment source unavailable, using neutral");
            SentimentSample::neutral(now)
        }
    }
}

/// Sentiment source that is never available; the sentinel degrades to pure
/// price-regime governance
pub struct NeutralSentiment;

#[async_trait]
impl SentimentSource for NeutralSentiment {
    async fn current_score(&self) -> Result<f64> {
        Ok(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f64,
}

/// HTTP-backed sentiment source: GET `endpoint` returning `{"score": <f64>}`
/// from the external model service
pub struct HttpSentimentSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSentimentSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl SentimentSource for HttpSentimentSource {
    async fn current_score(&self) -> Result<f64> {
        let resp = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;
        let body: ScoreResponse = resp.json().await?;
        Ok(body.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SentinelError;

    struct FailingSource;

    #[async_trait]
    impl SentimentSource for FailingSource {
        async fn current_score(&self) -> Result<f64> {
            Err(SentinelError::MarketDataUnavailable("feed offline".into()))
        }
    }

    struct FixedSource(f64);

    #[async_trait]
    impl SentimentSource for FixedSource {
        async fn current_score(&self) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_failure_substitutes_neutral() {
        let sample = sample_or_neutral(&FailingSource).await;
        assert_eq!(sample.score, 0.0);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let sample = sample_or_neutral(&FixedSource(7.5)).await;
        assert_eq!(sample.score, 1.0);

        let sample = sample_or_neutral(&FixedSource(-0.42)).await;
        assert_eq!(sample.score, -0.42);
    }
}
