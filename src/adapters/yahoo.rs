//! Yahoo Finance chart API client
//!
//! Exposes the three fallback tiers the fetch orchestrator chains per asset:
//! an instant snapshot (chart meta regular market price), the most recent
//! close of a 1-minute intraday series, and the most recent close of a 5-day
//! daily series. The unofficial v8 chart endpoint serves all three.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::fetcher::ProviderSource;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

// Yahoo rejects requests without a browser-ish user agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    // Nulls appear for minutes with no trades.
    close: Option<Vec<Option<f64>>>,
}

/// Yahoo provider client
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: YAHOO_CHART_URL.to_string(),
        })
    }

    async fn fetch_chart(&self, symbol: &str, range: &str, interval: &str) -> Result<ChartResponse> {
        let url = format!(
            "{}/{}?range={}&interval={}",
            self.base_url, symbol, range, interval
        );
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Most recent non-null close of a chart series, if any
    fn last_close(response: &ChartResponse) -> Option<f64> {
        let result = response.chart.result.as_ref()?.first()?;
        let closes = result.indicators.as_ref()?.quote.first()?.close.as_ref()?;
        closes.iter().rev().find_map(|c| *c)
    }
}

#[async_trait]
impl ProviderSource for YahooClient {
    async fn snapshot_price(&self, symbol: &str) -> Result<Option<f64>> {
        let response = self.fetch_chart(symbol, "1d", "1d").await?;
        let price = response
            .chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .and_then(|r| r.meta.regular_market_price);
        debug!(symbol, ?price, "yahoo snapshot");
        Ok(price)
    }

    async fn intraday_close(&self, symbol: &str) -> Result<Option<f64>> {
        let response = self.fetch_chart(symbol, "1d", "1m").await?;
        let price = Self::last_close(&response);
        debug!(symbol, ?price, "yahoo 1m close");
        Ok(price)
    }

    async fn daily_close(&self, symbol: &str) -> Result<Option<f64>> {
        let response = self.fetch_chart(symbol, "5d", "1d").await?;
        let price = Self::last_close(&response);
        debug!(symbol, ?price, "yahoo 5d close");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_close_skips_trailing_nulls() {
        let response: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{"meta":{"regularMarketPrice":null},
                "indicators":{"quote":[{"close":[101.0,102.5,null,null]}]}}]}}"#,
        )
        .unwrap();
        assert_eq!(YahooClient::last_close(&response), Some(102.5));
    }

    #[test]
    fn test_last_close_empty_series() {
        let response: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{"close":[]}]}}]}}"#,
        )
        .unwrap();
        assert_eq!(YahooClient::last_close(&response), None);

        let response: ChartResponse =
            serde_json::from_str(r#"{"chart":{"result":null}}"#).unwrap();
        assert_eq!(YahooClient::last_close(&response), None);
    }
}
