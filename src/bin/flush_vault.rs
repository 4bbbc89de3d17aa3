//! Out-of-band maintenance: wipe the telemetry table.
//!
//! Deletion is never part of the ingestion contract; this exists for resets
//! between experiments.

use sentinel::adapters::TelemetryStore;
use sentinel::config::AppConfig;
use sentinel::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let config = AppConfig::load()?;
    let store = TelemetryStore::new(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;

    let deleted = store.purge_telemetry().await?;
    println!("Vault cleared: {deleted} telemetry rows deleted.");
    Ok(())
}
