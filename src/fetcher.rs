//! Source fetch orchestrator
//!
//! One fetch per configured asset per tick, all running concurrently.
//! Exchange assets get a single ticker call; provider assets walk a tiered
//! fallback chain (snapshot -> 1m series close -> daily series close). Any
//! failure converts to omission for that asset alone; `fetch_all` itself
//! never fails.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::domain::{AssetQuote, PriceSource};
use crate::error::Result;

/// Exchange-style upstream: latest trade price, low latency, may fail
#[async_trait]
pub trait ExchangeSource: Send + Sync {
    async fn last_trade_price(&self, symbol: &str) -> Result<f64>;
}

/// General market-data provider with three fallback tiers
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Instant snapshot price, if the provider has one
    async fn snapshot_price(&self, symbol: &str) -> Result<Option<f64>>;
    /// Most recent close of a short-interval intraday series
    async fn intraday_close(&self, symbol: &str) -> Result<Option<f64>>;
    /// Most recent close of a longer-range daily series
    async fn daily_close(&self, symbol: &str) -> Result<Option<f64>>;
}

/// Scatter/gather fetch orchestrator over the configured asset set
pub struct MarketFetcher {
    exchange: Arc<dyn ExchangeSource>,
    provider: Arc<dyn ProviderSource>,
    assets: Vec<AssetConfig>,
}

impl MarketFetcher {
    pub fn new(
        exchange: Arc<dyn ExchangeSource>,
        provider: Arc<dyn ProviderSource>,
        assets: Vec<AssetConfig>,
    ) -> Self {
        Self {
            exchange,
            provider,
            assets,
        }
    }

    /// Fetch every configured asset concurrently. Returns 0..N quotes;
    /// callers must not assume completeness.
    pub async fn fetch_all(&self) -> Vec<AssetQuote> {
        let futures = self.assets.iter().map(|asset| self.fetch_one(asset));
        join_all(futures).await.into_iter().flatten().collect()
    }

    async fn fetch_one(&self, asset: &AssetConfig) -> Option<AssetQuote> {
        let price = match asset.source {
            PriceSource::Binance => match self.exchange.last_trade_price(&asset.symbol).await {
                Ok(price) => Some(price),
                Err(e) => {
                    warn!(asset = %asset.key, error = %e, "exchange fetch failed, omitting");
                    None
                }
            },
            PriceSource::Yahoo => self.fetch_tiered(asset).await,
        }?;

        let calibrated = price * asset.calibration.unwrap_or(1.0);

        Some(AssetQuote {
            asset: asset.key.clone(),
            price: calibrated,
            source: asset.source,
            timestamp: Utc::now(),
        })
    }

    /// Walk the provider tiers; first usable (finite, non-zero) value wins.
    /// Exhausting all tiers yields omission, not an error.
    async fn fetch_tiered(&self, asset: &AssetConfig) -> Option<f64> {
        let symbol = asset.symbol.as_str();

        let snapshot = self.provider.snapshot_price(symbol).await;
        if let Some(price) = tier_hit(asset, "snapshot", snapshot) {
            return Some(price);
        }

        let intraday = self.provider.intraday_close(symbol).await;
        if let Some(price) = tier_hit(asset, "intraday", intraday) {
            return Some(price);
        }

        let daily = self.provider.daily_close(symbol).await;
        if let Some(price) = tier_hit(asset, "daily", daily) {
            return Some(price);
        }

        warn!(asset = %asset.key, "all provider tiers exhausted, omitting");
        None
    }
}

fn tier_hit(asset: &AssetConfig, tier: &str, result: Result<Option<f64>>) -> Option<f64> {
    match result {
        Ok(Some(price)) if usable(price) => {
            debug!(asset = %asset.key, tier, price, "provider tier hit");
            Some(price)
        }
        Ok(_) => {
            debug!(asset = %asset.key, tier, "provider tier empty");
            None
        }
        Err(e) => {
            debug!(asset = %asset.key, tier, error = %e, "provider tier failed");
            None
        }
    }
}

fn usable(price: f64) -> bool {
    price.is_finite() && price != 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SentinelError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeExchange {
        price: Option<f64>,
        calls: AtomicU32,
    }

    impl FakeExchange {
        fn up(price: f64) -> Self {
            Self {
                price: Some(price),
                calls: AtomicU32::new(0),
            }
        }

        fn down() -> Self {
            Self {
                price: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ExchangeSource for FakeExchange {
        async fn last_trade_price(&self, _symbol: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.price
                .ok_or_else(|| SentinelError::MarketDataUnavailable("exchange down".into()))
        }
    }

    struct FakeProvider {
        snapshot: Result<Option<f64>>,
        intraday: Result<Option<f64>>,
        daily: Result<Option<f64>>,
    }

    fn err() -> Result<Option<f64>> {
        Err(SentinelError::MarketDataUnavailable("provider down".into()))
    }

    #[async_trait]
    impl ProviderSource for FakeProvider {
        async fn snapshot_price(&self, _symbol: &str) -> Result<Option<f64>> {
            clone_result(&self.snapshot)
        }

        async fn intraday_close(&self, _symbol: &str) -> Result<Option<f64>> {
            clone_result(&self.intraday)
        }

        async fn daily_close(&self, _symbol: &str) -> Result<Option<f64>> {
            clone_result(&self.daily)
        }
    }

    fn clone_result(r: &Result<Option<f64>>) -> Result<Option<f64>> {
        match r {
            Ok(v) => Ok(*v),
            Err(_) => err(),
        }
    }

    fn assets() -> Vec<AssetConfig> {
        vec![
            AssetConfig {
                key: "BTC".to_string(),
                symbol: "BTCUSDT".to_string(),
                source: PriceSource::Binance,
                calibration: None,
            },
            AssetConfig {
                key: "MCX_GOLD".to_string(),
                symbol: "GOLDBEES.NS".to_string(),
                source: PriceSource::Yahoo,
                calibration: Some(1240.0),
            },
        ]
    }

    #[tokio::test]
    async fn test_every_upstream_down_yields_empty_set() {
        let fetcher = MarketFetcher::new(
            Arc::new(FakeExchange::down()),
            Arc::new(FakeProvider {
                snapshot: err(),
                intraday: err(),
                daily: err(),
            }),
            assets(),
        );

        let quotes = fetcher.fetch_all().await;
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_intraday_tier_wins_when_snapshot_fails() {
        let fetcher = MarketFetcher::new(
            Arc::new(FakeExchange::down()),
            Arc::new(FakeProvider {
                snapshot: err(),
                intraday: Ok(Some(124.5)),
                daily: Ok(Some(999.0)),
            }),
            assets(),
        );

        let quotes = fetcher.fetch_all().await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].asset, "MCX_GOLD");
        // Series last point with the documented calibration multiplier.
        assert_eq!(quotes[0].price, 124.5 * 1240.0);
        assert_eq!(quotes[0].source, PriceSource::Yahoo);
    }

    #[tokio::test]
    async fn test_zero_snapshot_advances_to_next_tier() {
        let fetcher = MarketFetcher::new(
            Arc::new(FakeExchange::down()),
            Arc::new(FakeProvider {
                snapshot: Ok(Some(0.0)),
                intraday: Ok(None),
                daily: Ok(Some(42.0)),
            }),
            assets(),
        );

        let quotes = fetcher.fetch_all().await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].price, 42.0 * 1240.0);
    }

    #[tokio::test]
    async fn test_exchange_failure_does_not_block_provider_assets() {
        let fetcher = MarketFetcher::new(
            Arc::new(FakeExchange::down()),
            Arc::new(FakeProvider {
                snapshot: Ok(Some(180.0)),
                intraday: Ok(None),
                daily: Ok(None),
            }),
            assets(),
        );

        let quotes = fetcher.fetch_all().await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].asset, "MCX_GOLD");
    }

    #[tokio::test]
    async fn test_full_cycle_returns_both_sources() {
        let exchange = Arc::new(FakeExchange::up(65000.0));
        let fetcher = MarketFetcher::new(
            exchange.clone(),
            Arc::new(FakeProvider {
                snapshot: Ok(Some(180.0)),
                intraday: Ok(None),
                daily: Ok(None),
            }),
            assets(),
        );

        let quotes = fetcher.fetch_all().await;
        assert_eq!(quotes.len(), 2);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);

        let btc = quotes.iter().find(|q| q.asset == "BTC").unwrap();
        assert_eq!(btc.price, 65000.0);
        assert_eq!(btc.source, PriceSource::Binance);
    }
}
