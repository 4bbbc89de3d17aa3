use sentinel::config::AppConfig;
use sentinel::engine::{regime_channel, run_engine_supervised, run_sentinel_supervised};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(json: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},sentinel=debug,sqlx=warn")));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    // Configuration problems are fatal before the loops begin; nothing at
    // runtime is allowed to kill the process.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(config.logging.json, &config.logging.level);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {e}");
        }
        std::process::exit(1);
    }

    info!(
        assets = config.assets.len(),
        tick_secs = config.engine.tick_secs,
        "sentinel starting"
    );

    let (regime_tx, regime_rx) = regime_channel();

    tokio::select! {
        _ = run_engine_supervised(config.clone(), regime_tx) => {}
        _ = run_sentinel_supervised(config, regime_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping...");
        }
    }
}
