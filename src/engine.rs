//! Ingestion engine and restart supervision
//!
//! Two supervised loops share one process: the ingestion engine
//! (fetch -> classify -> persist on a fixed cadence) and the sentiment
//! sentinel (sentiment + latest regime -> governance -> persist). Each runs
//! inside `supervise`, which rebuilds the loop from scratch after a fatal
//! fault and never gives up.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::adapters::{AuditLog, BinanceClient, TelemetryStore, YahooClient};
use crate::classifier::{RegimeClassifier, RegimeResult};
use crate::config::AppConfig;
use crate::domain::{SentinelRecord, TelemetryRecord};
use crate::error::Result;
use crate::fetcher::MarketFetcher;
use crate::governance::GovernanceBreaker;
use crate::sentiment::{sample_or_neutral, HttpSentimentSource, NeutralSentiment, SentimentSource};

/// Latest classified regime, published by the engine for the sentinel loop
#[derive(Debug, Clone)]
pub struct RegimeSnapshot {
    pub asset: String,
    pub result: RegimeResult,
    pub at: DateTime<Utc>,
}

pub type RegimeSender = watch::Sender<Option<RegimeSnapshot>>;
pub type RegimeReceiver = watch::Receiver<Option<RegimeSnapshot>>;

pub fn regime_channel() -> (RegimeSender, RegimeReceiver) {
    watch::channel(None)
}

/// Pick the snapshot to publish for a tick: the most severe regime wins, and
/// on a tie the earlier-classified asset is kept.
fn worst_snapshot(current: Option<RegimeSnapshot>, candidate: RegimeSnapshot) -> RegimeSnapshot {
    match current {
        Some(held) if held.result.regime >= candidate.result.regime => held,
        _ => candidate,
    }
}

/// Multi-asset ingestion engine: one instance per supervisor attempt. Dropping
/// it releases the upstream HTTP connection pools before the next attempt
/// connects fresh.
pub struct Engine {
    fetcher: MarketFetcher,
    classifier: RegimeClassifier,
    store: TelemetryStore,
    regime_tx: RegimeSender,
    tick_period: Duration,
}

impl Engine {
    /// Construct a fully-connected engine. Failures here (bad database URL,
    /// TLS setup) are engine-fatal and surface to the supervisor.
    pub async fn connect(config: &AppConfig, regime_tx: RegimeSender) -> Result<Self> {
        let timeout = Duration::from_secs(config.engine.fetch_timeout_secs);
        let exchange = Arc::new(BinanceClient::new(timeout)?);
        let provider = Arc::new(YahooClient::new(timeout)?);
        let fetcher = MarketFetcher::new(exchange, provider, config.assets.clone());

        let store =
            TelemetryStore::new(&config.database.url, config.database.max_connections).await?;
        store.migrate().await?;

        Ok(Self {
            fetcher,
            classifier: RegimeClassifier::new(config.classifier.clone()),
            store,
            regime_tx,
            tick_period: Duration::from_secs(config.engine.tick_secs),
        })
    }

    /// Run ticks forever. The cadence is wall clock: each sleep starts after
    /// the tick finishes, so cycle duration is not drift-corrected.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            tick_secs = self.tick_period.as_secs(),
            "ingestion engine live"
        );
        loop {
            self.tick().await?;
            sleep(self.tick_period).await;
        }
    }

    /// One ingestion cycle: scatter/gather fetch, classify, persist each
    /// record independently. A record's persistence failure is logged and
    /// never blocks its siblings or the next tick.
    async fn tick(&mut self) -> Result<()> {
        let quotes = self.fetcher.fetch_all().await;
        if quotes.is_empty() {
            warn!("no quotes this cycle; all upstreams omitted");
            return Ok(());
        }

        let mut worst: Option<RegimeSnapshot> = None;
        for quote in &quotes {
            let result = self.classifier.classify(&quote.asset, quote.price);

            worst = Some(worst_snapshot(
                worst,
                RegimeSnapshot {
                    asset: quote.asset.clone(),
                    result,
                    at: quote.timestamp,
                },
            ));

            let record = TelemetryRecord::from_quote(quote, &result);
            match self.store.insert_telemetry(&record).await {
                Ok(()) => info!(
                    asset = %record.asset,
                    price = record.price,
                    regime = %record.regime,
                    z = record.z_score,
                    "telemetry synced"
                ),
                Err(e) => error!(asset = %record.asset, error = %e, "telemetry insert failed"),
            }
        }

        // Publish once per tick so a severe regime on one asset is not
        // shadowed by a calmer asset classified later in the same cycle.
        if let Some(snapshot) = worst {
            let _ = self.regime_tx.send_replace(Some(snapshot));
        }

        Ok(())
    }
}

/// Sentiment/governance sentinel: the single evaluator of governance state,
/// so counter updates and cooldown transitions are serialized by construction.
pub struct SentimentSentinel {
    source: Arc<dyn SentimentSource>,
    governance: GovernanceBreaker,
    store: TelemetryStore,
    audit: Option<AuditLog>,
    regime_rx: RegimeReceiver,
    poll_period: Duration,
}

impl SentimentSentinel {
    pub async fn connect(config: &AppConfig, regime_rx: RegimeReceiver) -> Result<Self> {
        let source: Arc<dyn SentimentSource> = match &config.sentiment.endpoint {
            Some(endpoint) => Arc::new(HttpSentimentSource::new(
                endpoint,
                Duration::from_secs(config.engine.fetch_timeout_secs),
            )?),
            None => Arc::new(NeutralSentiment),
        };

        let store =
            TelemetryStore::new(&config.database.url, config.database.max_connections).await?;
        // Idempotent; whichever loop connects first creates the schema, so a
        // sentinel that wins the race does not log into missing tables.
        store.migrate().await?;

        let audit = match &config.audit.path {
            Some(path) => Some(AuditLog::new(path)?),
            None => None,
        };

        Ok(Self {
            source,
            governance: GovernanceBreaker::new(config.governance.clone()),
            store,
            audit,
            regime_rx,
            poll_period: Duration::from_secs(config.sentiment.poll_secs),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            poll_secs = self.poll_period.as_secs(),
            "sentiment sentinel live"
        );
        loop {
            self.tick().await?;
            sleep(self.poll_period).await;
        }
    }

    async fn tick(&mut self) -> Result<()> {
        let sample = sample_or_neutral(self.source.as_ref()).await;

        // Latest regime across assets; cold engine means INITIALIZING.
        let result = self
            .regime_rx
            .borrow()
            .as_ref()
            .map(|s| s.result)
            .unwrap_or_else(RegimeResult::initializing);

        let now = Utc::now();
        let assessment = self.governance.evaluate(result.regime, sample.score, now);
        info!(
            regime = %result.regime,
            z = result.z_score,
            sentiment = sample.score,
            verdict = %assessment.verdict,
            counter = assessment.anomaly_counter,
            "governance evaluated"
        );

        let record = SentinelRecord::new(now, &result, &sample, &assessment);

        if let Err(e) = self.store.insert_sentinel_log(&record).await {
            error!(error = %e, "sentinel log insert failed");
        }

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.append(&record) {
                error!(error = %e, "audit append failed");
            }
        }

        Ok(())
    }
}

/// Unbounded restart supervision: run an attempt, and when it fails tear it
/// down, wait out the backoff and rebuild from scratch. The system is meant
/// to run unattended indefinitely, so there is no attempt ceiling.
pub async fn supervise<F, Fut>(name: &str, backoff: Duration, mut attempt: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        match attempt().await {
            Ok(()) => warn!(component = name, "loop ended cleanly; restarting"),
            Err(e) => error!(
                component = name,
                error = %e,
                "fatal fault, rebuilding in {}s",
                backoff.as_secs()
            ),
        }
        sleep(backoff).await;
    }
}

/// Supervised ingestion engine lifetime
pub async fn run_engine_supervised(config: AppConfig, regime_tx: RegimeSender) {
    let backoff = Duration::from_secs(config.engine.restart_backoff_secs);
    supervise("engine", backoff, || {
        let config = config.clone();
        let regime_tx = regime_tx.clone();
        async move {
            // The previous engine (and its exchange connection pool) is gone
            // before a new connect starts.
            Engine::connect(&config, regime_tx).await?.run().await
        }
    })
    .await;
}

/// Supervised sentiment sentinel lifetime
pub async fn run_sentinel_supervised(config: AppConfig, regime_rx: RegimeReceiver) {
    let backoff = Duration::from_secs(config.engine.restart_backoff_secs);
    supervise("sentinel", backoff, || {
        let config = config.clone();
        let regime_rx = regime_rx.clone();
        async move {
            SentimentSentinel::connect(&config, regime_rx)
                .await?
                .run()
                .await
        }
    })
    .await;
}
