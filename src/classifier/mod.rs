//! Online market regime classification
//!
//! Maintains a bounded rolling price history per asset and converts each new
//! price into a z-score against the pre-update window, bucketed into a
//! categorical regime label. Pure and synchronous; no I/O.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::ClassifierConfig;

const STD_EPSILON: f64 = 1e-6;

/// Categorical label describing how far a price sits from its rolling
/// baseline. Variant order doubles as severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Initializing,
    Stable,
    Stress,
    Anomaly,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Initializing => "INITIALIZING",
            Regime::Stable => "STABLE",
            Regime::Stress => "STRESS",
            Regime::Anomaly => "ANOMALY",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification output: regime plus the z-score that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub regime: Regime,
    pub z_score: f64,
}

impl RegimeResult {
    pub fn initializing() -> Self {
        Self {
            regime: Regime::Initializing,
            z_score: 0.0,
        }
    }
}

/// Fixed-capacity FIFO price history for one asset.
///
/// Warm once it holds `warmup` samples; until then classification yields
/// INITIALIZING while prices are still recorded.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    prices: VecDeque<f64>,
    capacity: usize,
    warmup: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize, warmup: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
            warmup,
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn is_warm(&self) -> bool {
        self.prices.len() >= self.warmup
    }

    /// Append a price, evicting the oldest sample on overflow
    pub fn push(&mut self, price: f64) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub fn mean(&self) -> f64 {
        if self.prices.is_empty() {
            return 0.0;
        }
        self.prices.iter().sum::<f64>() / self.prices.len() as f64
    }

    /// Population standard deviation over the current contents
    pub fn std_dev(&self) -> f64 {
        if self.prices.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .prices
            .iter()
            .map(|p| {
                let d = p - mean;
                d * d
            })
            .sum::<f64>()
            / self.prices.len() as f64;
        variance.sqrt()
    }

    #[cfg(test)]
    fn contains(&self, price: f64) -> bool {
        self.prices.iter().any(|p| *p == price)
    }
}

/// Per-asset window registry plus classification thresholds.
///
/// Windows are created deterministically on first observation; each asset's
/// window is mutated only through `classify`, by the single owner of that
/// asset's stream.
pub struct RegimeClassifier {
    windows: HashMap<String, RollingWindow>,
    last_results: HashMap<String, RegimeResult>,
    config: ClassifierConfig,
}

impl RegimeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            windows: HashMap::new(),
            last_results: HashMap::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ClassifierConfig::default())
    }

    /// Classify one price against the asset's rolling baseline.
    ///
    /// Statistics are computed over the window BEFORE the new price is
    /// appended, so a price never contributes to its own baseline. Non-finite
    /// prices are skipped without touching the window and return the asset's
    /// previous result (a bad upstream datum must not read as an engine
    /// fault).
    pub fn classify(&mut self, asset: &str, price: f64) -> RegimeResult {
        if !price.is_finite() {
            return self
                .last_results
                .get(asset)
                .copied()
                .unwrap_or_else(RegimeResult::initializing);
        }

        let window = self
            .windows
            .entry(asset.to_string())
            .or_insert_with(|| RollingWindow::new(self.config.window_size, self.config.warmup));

        let result = if !window.is_warm() {
            RegimeResult::initializing()
        } else {
            let mean = window.mean();
            let std = window.std_dev();
            let z = if std > STD_EPSILON {
                (price - mean) / std
            } else {
                0.0
            };

            // Bucket on the raw z; only the reported score is rounded.
            let regime = if z.abs() >= self.config.anomaly_z {
                Regime::Anomaly
            } else if z.abs() >= self.config.stress_z {
                Regime::Stress
            } else {
                Regime::Stable
            };

            RegimeResult {
                regime,
                z_score: (z * 100.0).round() / 100.0,
            }
        };

        window.push(price);
        self.last_results.insert(asset.to_string(), result);
        result
    }

    /// Number of samples recorded for an asset (0 if never observed)
    pub fn window_len(&self, asset: &str) -> usize {
        self.windows.get(asset).map(RollingWindow::len).unwrap_or(0)
    }
}
