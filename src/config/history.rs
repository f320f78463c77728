//! Historical data retrieval configuration.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Candle history settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Inclusive range start (RFC 3339).
    pub start: Option<DateTime<Utc>>,
    /// Exclusive range end (RFC 3339); now when unset.
    pub end: Option<DateTime<Utc>>,
    /// Candle interval (default: 1m).
    #[serde(default, with = "duration")]
    pub timeframe: Duration,
    /// Maximum candles per request (default: 100).
    pub page_limit: Option<u32>,
    /// Length of each fetch-and-merge window (default: 100m).
    #[serde(default, with = "duration")]
    pub window: Duration,
}

/// Backtest simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Fraction of the portfolio allocated per trade, in (0, 1] (default: 0.1).
    pub trade_fraction: Option<f64>,
    /// Starting portfolio value (default: 10000).
    pub initial_capital: Option<f64>,
    /// Simulation steps per year used to annualize Sharpe (default: 525600).
    pub steps_per_year: Option<u64>,
}
