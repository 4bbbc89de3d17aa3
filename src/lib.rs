pub mod adapters;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod governance;
pub mod sentiment;

pub use adapters::{AuditLog, BinanceClient, TelemetryStore, YahooClient};
pub use classifier::{Regime, RegimeClassifier, RegimeResult, RollingWindow};
pub use config::AppConfig;
pub use domain::{AssetQuote, PriceSource, SentimentSample, SentinelRecord, TelemetryRecord};
pub use engine::{Engine, RegimeSnapshot, SentimentSentinel};
pub use error::{Result, SentinelError};
pub use fetcher::{ExchangeSource, MarketFetcher, ProviderSource};
pub use governance::{GovernanceBreaker, RiskAssessment, Verdict};
pub use sentiment::{HttpSentimentSource, NeutralSentiment, SentimentSource};
