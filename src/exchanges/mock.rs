//! In-memory market data source for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ExchangeError, MarketData, Result};
use crate::domain::{Candle, Quote};

/// Mock market data source with per-pair quotes and candle series.
#[derive(Default)]
pub(crate) struct MockMarketData {
    quotes: HashMap<String, Quote>,
    failing_quotes: HashSet<String>,
    candles: HashMap<String, Vec<Candle>>,
    /// Pair to the number of candle requests that succeed before it fails.
    failing_candles: HashMap<String, usize>,
    candle_calls: Mutex<Vec<(String, DateTime<Utc>, u32)>>,
}

impl MockMarketData {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_quote(mut self, pair: &str, last: f64) -> Self {
        self.quotes.insert(
            pair.to_string(),
            Quote {
                last: Some(last),
                volume: Some(10.0),
                timestamp: Utc::now(),
            },
        );
        self
    }

    pub(crate) fn with_missing_last(mut self, pair: &str) -> Self {
        self.quotes.insert(
            pair.to_string(),
            Quote {
                last: None,
                volume: None,
                timestamp: Utc::now(),
            },
        );
        self
    }

    pub(crate) fn with_failing_quote(mut self, pair: &str) -> Self {
        self.failing_quotes.insert(pair.to_string());
        self
    }

    /// Adds candles for a pair as (open time in ms, close) tuples.
    pub(crate) fn with_candles(mut self, pair: &str, candles: &[(i64, f64)]) -> Self {
        let mut series: Vec<Candle> = candles
            .iter()
            .filter_map(|&(ms, close)| {
                DateTime::<Utc>::from_timestamp_millis(ms).map(|t| Candle::new(t, close))
            })
            .collect();
        series.sort_by_key(|c| c.open_time);
        self.candles.insert(pair.to_string(), series);
        self
    }

    pub(crate) fn with_failing_candles(self, pair: &str) -> Self {
        self.with_candles_failing_after(pair, 0)
    }

    /// Serves the first `calls` candle requests for a pair, then fails.
    pub(crate) fn with_candles_failing_after(mut self, pair: &str, calls: usize) -> Self {
        self.failing_candles.insert(pair.to_string(), calls);
        self
    }

    /// Returns (pair, since, limit) for every candle request made.
    pub(crate) fn candle_calls(&self) -> Vec<(String, DateTime<Utc>, u32)> {
        self.candle_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn fetch_quote(&self, pair: &str) -> Result<Quote> {
        if self.failing_quotes.contains(pair) {
            return Err(ExchangeError::Connection("mock quote failure".into()));
        }
        self.quotes
            .get(pair)
            .cloned()
            .ok_or_else(|| ExchangeError::PairNotSupported(pair.to_string()))
    }

    async fn fetch_candles(
        &self,
        pair: &str,
        _timeframe: Duration,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let made = match self.candle_calls.lock() {
            Ok(mut calls) => {
                calls.push((pair.to_string(), since, limit));
                calls.iter().filter(|(p, _, _)| p == pair).count()
            }
            Err(_) => 0,
        };

        if let Some(&allowed) = self.failing_candles.get(pair) {
            if made > allowed {
                return Err(ExchangeError::Api("mock candle failure".into()));
            }
        }

        Ok(self
            .candles
            .get(pair)
            .map(|series| {
                series
                    .iter()
                    .filter(|c| c.open_time >= since)
                    .take(limit as usize)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}
