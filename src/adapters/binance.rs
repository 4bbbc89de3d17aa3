//! Binance REST ticker client
//!
//! One capability: latest trade price for a symbol. Low latency, bounded
//! timeout; failures are isolated per asset by the fetch orchestrator.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SentinelError};
use crate::fetcher::ExchangeSource;

const BINANCE_API_URL: &str = "https://api.binance.com";

/// Response from /api/v3/ticker/price
#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

/// Binance exchange client. The underlying reqwest client owns a connection
/// pool that is released when the engine holding this value is dropped.
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: BINANCE_API_URL.to_string(),
        })
    }
}

#[async_trait]
impl ExchangeSource for BinanceClient {
    async fn last_trade_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let ticker: TickerPrice = resp.json().await?;

        let price: f64 = ticker.price.parse().map_err(|_| {
            SentinelError::InvalidMarketData(format!(
                "unparseable ticker price for {}: {}",
                symbol, ticker.price
            ))
        })?;

        if !(price.is_finite() && price > 0.0) {
            return Err(SentinelError::InvalidMarketData(format!(
                "non-positive ticker price for {}: {}",
                symbol, price
            )));
        }

        debug!(symbol, price, "binance ticker");
        Ok(price)
    }
}
