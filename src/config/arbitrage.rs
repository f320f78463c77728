//! Arbitrage detection configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Triangle legs in "BASE/QUOTE" format.
#[derive(Debug, Clone, Deserialize)]
pub struct TriangleConfig {
    /// A/C leg (e.g., "BTC/USDT").
    pub ac: String,
    /// B/C leg (e.g., "ETH/USDT").
    pub bc: String,
    /// B/A leg (e.g., "ETH/BTC").
    pub ba: String,
}

/// Arbitrage detection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    /// Minimum gross return over 1.0 to flag a cycle (e.g., 0.002 for 0.2%).
    pub threshold: Option<f64>,
    /// Interval between live snapshot reads (default: 5s).
    #[serde(default, with = "duration")]
    pub poll_interval: Duration,
}
