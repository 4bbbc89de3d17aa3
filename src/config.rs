use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::domain::PriceSource;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Assets to ingest each tick
    pub assets: Vec<AssetConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    /// Internal asset key (e.g., "BTC", "MCX_GOLD")
    pub key: String,
    /// Upstream symbol (e.g., "BTCUSDT", "GOLDBEES.NS")
    pub symbol: String,
    /// Which upstream serves this asset
    pub source: PriceSource,
    /// Linear scale factor aligning proxy instruments with the reference
    /// market price (e.g., GOLDBEES NAV -> MCX gold contract range)
    #[serde(default)]
    pub calibration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Rolling window capacity per asset
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Samples required before real statistics are produced
    #[serde(default = "default_warmup")]
    pub warmup: usize,
    /// |z| at or above this is STRESS
    #[serde(default = "default_stress_z")]
    pub stress_z: f64,
    /// |z| at or above this is ANOMALY
    #[serde(default = "default_anomaly_z")]
    pub anomaly_z: f64,
}

fn default_window_size() -> usize {
    50
}

fn default_warmup() -> usize {
    20
}

fn default_stress_z() -> f64 {
    1.5
}

fn default_anomaly_z() -> f64 {
    3.0
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            warmup: default_warmup(),
            stress_z: default_stress_z(),
            anomaly_z: default_anomaly_z(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernanceConfig {
    /// Cooldown lock duration in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Anomaly counter value that trips the lock
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: u32,
    /// |sentiment| below this means "no narrative support" for a price anomaly
    #[serde(default = "default_divergence_sentiment")]
    pub divergence_sentiment: f64,
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_trigger_threshold() -> u32 {
    5
}

fn default_divergence_sentiment() -> f64 {
    0.2
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            trigger_threshold: default_trigger_threshold(),
            divergence_sentiment: default_divergence_sentiment(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seconds between ingestion ticks (wall clock, not drift-corrected)
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Backoff before the supervisor rebuilds a failed engine
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,
    /// Per-request timeout for upstream fetches
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_tick_secs() -> u64 {
    30
}

fn default_restart_backoff_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            restart_backoff_secs: default_restart_backoff_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    /// HTTP endpoint returning the current sentiment scalar; when unset the
    /// sentinel runs on the neutral fallback alone
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Seconds between sentiment/governance evaluations
    #[serde(default = "default_tick_secs")]
    pub poll_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            poll_secs: default_tick_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditConfig {
    /// Local CSV mirror of sentinel records; disabled when unset
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SENTINEL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SENTINEL_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.assets.is_empty() {
            errors.push("at least one asset must be configured".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for asset in &self.assets {
            if !seen.insert(asset.key.as_str()) {
                errors.push(format!("duplicate asset key: {}", asset.key));
            }
            if let Some(cal) = asset.calibration {
                if !(cal.is_finite() && cal > 0.0) {
                    errors.push(format!(
                        "calibration for {} must be finite and positive",
                        asset.key
                    ));
                }
            }
        }

        if self.classifier.warmup < 2 {
            errors.push("classifier.warmup must be at least 2".to_string());
        }

        if self.classifier.warmup > self.classifier.window_size {
            errors.push("classifier.warmup cannot exceed classifier.window_size".to_string());
        }

        if self.classifier.stress_z <= 0.0 || self.classifier.anomaly_z <= self.classifier.stress_z
        {
            errors.push("regime thresholds must satisfy 0 < stress_z < anomaly_z".to_string());
        }

        if self.governance.trigger_threshold == 0 {
            errors.push("governance.trigger_threshold must be positive".to_string());
        }

        if self.governance.cooldown_secs == 0 {
            errors.push("governance.cooldown_secs must be positive".to_string());
        }

        if self.engine.tick_secs == 0 {
            errors.push("engine.tick_secs must be positive".to_string());
        }

        if self.sentiment.poll_secs == 0 {
            errors.push("sentiment.poll_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            assets: vec![
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
            ],
            classifier: ClassifierConfig::default(),
            governance: GovernanceConfig::default(),
            engine: EngineConfig::default(),
            sentiment: SentimentConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/sentinel".to_string(),
                max_connections: 5,
            },
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let cfg = base_config();
        assert_eq!(cfg.classifier.window_size, 50);
        assert_eq!(cfg.classifier.warmup, 20);
        assert_eq!(cfg.classifier.stress_z, 1.5);
        assert_eq!(cfg.classifier.anomaly_z, 3.0);
        assert_eq!(cfg.governance.cooldown_secs, 300);
        assert_eq!(cfg.governance.trigger_threshold, 5);
        assert_eq!(cfg.governance.divergence_sentiment, 0.2);
        assert_eq!(cfg.engine.tick_secs, 30);
        assert_eq!(cfg.engine.restart_backoff_secs, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_assets() {
        let mut cfg = base_config();
        cfg.assets.clear();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("at least one asset")));
    }

    #[test]
    fn test_validate_rejects_duplicate_keys() {
        let mut cfg = base_config();
        let dup = cfg.assets[0].clone();
        cfg.assets.push(dup);
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("duplicate asset key")));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut cfg = base_config();
        cfg.classifier.anomaly_z = 1.0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("regime thresholds")));
    }

    #[test]
    fn test_validate_rejects_bad_calibration() {
        let mut cfg = base_config();
        cfg.assets[1].calibration = Some(0.0);
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("calibration")));
    }
}
