//! Market data source abstractions and implementations.

#[cfg(test)]
pub(crate) mod mock;
pub mod poloniex;
mod utils;

use crate::domain::{Candle, Quote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub use poloniex::PoloniexExchange;

/// Exchange errors.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Trading pair is not supported by this exchange.
    #[error("pair {0} is not supported")]
    PairNotSupported(String),

    /// Candle interval is not offered by this exchange.
    #[error("timeframe {0:?} is not supported")]
    UnsupportedTimeframe(Duration),

    /// Requested page size is outside what the exchange serves.
    #[error("candle limit {limit} is outside 1..={max}")]
    InvalidLimit { limit: u32, max: u32 },

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// API error from the exchange.
    #[error("API error: {0}")]
    Api(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// MarketData is the read-only market data surface the pipeline consumes.
///
/// Both calls may fail transiently (network, rate limits); callers decide
/// whether a failure is fatal.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// FetchQuote returns the last trade price and base volume for a pair.
    /// The pair format is "BASE/QUOTE" (e.g., "BTC/USDT").
    async fn fetch_quote(&self, pair: &str) -> Result<Quote>;

    /// FetchCandles returns up to `limit` candles with open time at or after
    /// `since`, sorted ascending by open time. Fewer than `limit` candles are
    /// returned near the current time.
    async fn fetch_candles(
        &self,
        pair: &str,
        timeframe: Duration,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>>;
}
