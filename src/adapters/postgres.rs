//! PostgreSQL telemetry store

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::domain::{SentinelRecord, TelemetryRecord};
use crate::error::Result;

/// PostgreSQL storage adapter for telemetry and sentinel records
#[derive(Clone)]
pub struct TelemetryStore {
    pool: PgPool,
}

impl TelemetryStore {
    /// Create a new store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Append one telemetry record (append-only; no updates in normal operation)
    pub async fn insert_telemetry(&self, record: &TelemetryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO multi_asset_telemetry (asset, price, source, captured_at, regime, z_score)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.asset)
        .bind(record.price)
        .bind(record.source.as_str())
        .bind(record.timestamp)
        .bind(&record.regime)
        .bind(record.z_score)
        .execute(&self.pool)
        .await?;

        debug!(asset = %record.asset, regime = %record.regime, "telemetry persisted");
        Ok(())
    }

    /// Append one sentinel record (sentiment + governance verdict variant)
    pub async fn insert_sentinel_log(&self, record: &SentinelRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sentinel_logs (captured_at, z_score, sentiment, state, governance, anomaly_counter)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.timestamp)
        .bind(record.z_score)
        .bind(record.sentiment)
        .bind(&record.state)
        .bind(&record.governance)
        .bind(record.anomaly_counter)
        .execute(&self.pool)
        .await?;

        debug!(state = %record.state, "sentinel log persisted");
        Ok(())
    }

    /// Out-of-band maintenance: delete all telemetry rows. Not part of the
    /// ingestion contract; used by the flush-vault binary only.
    pub async fn purge_telemetry(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM multi_asset_telemetry")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
