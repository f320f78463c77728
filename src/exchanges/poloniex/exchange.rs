use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Config, ExchangeConfig};
use crate::domain::{Candle, Quote};
use crate::exchanges::poloniex::client::{Client, ClientError};
use crate::exchanges::utils::{parse_number, pair_to_symbol, timeframe_to_interval};
use crate::exchanges::{ExchangeError, MarketData, Result};

const EXCHANGE_NAME: &str = "poloniex";

/// Maximum acceptable clock drift between local and server time.
const MAX_CLOCK_DRIFT: Duration = Duration::from_secs(5);

/// Largest page the candles endpoint serves.
const MAX_CANDLES_PER_REQUEST: u32 = 500;

/// Column of the close price in a candle row.
const CANDLE_CLOSE_INDEX: usize = 3;

/// Column of the bucket start time (ms) in a candle row.
const CANDLE_START_TIME_INDEX: usize = 12;

/// Poloniex market data source.
pub struct PoloniexExchange {
    client: Client,
}

impl PoloniexExchange {
    /// Creates a new PoloniexExchange from the application config.
    ///
    /// Returns an error if Poloniex is not configured or not enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let exchange_config = config.exchanges.get(EXCHANGE_NAME).ok_or_else(|| {
            ExchangeError::Internal(format!("{} not found in config", EXCHANGE_NAME))
        })?;

        if !exchange_config.enabled {
            return Err(ExchangeError::Internal(format!(
                "{} is not enabled",
                EXCHANGE_NAME
            )));
        }

        Self::new(exchange_config)
    }

    /// Creates a new PoloniexExchange from its exchange section.
    pub fn new(exchange_config: &ExchangeConfig) -> Result<Self> {
        let client = Client::from_config(exchange_config)
            .map_err(|e| ExchangeError::Internal(format!("build http client: {}", e)))?;
        Ok(Self { client })
    }

    /// Checks API reachability and reports clock drift against the server.
    pub async fn check_connectivity(&self) -> Result<()> {
        let server_time = self
            .client
            .get_server_time()
            .await
            .map_err(|e| ExchangeError::Connection(format!("connect to poloniex: {}", e)))?;

        let drift = (Utc::now() - server_time).abs();

        info!(
            server_time = %server_time,
            clock_drift = ?drift,
            "connected to poloniex"
        );

        if drift > chrono::Duration::from_std(MAX_CLOCK_DRIFT).unwrap_or_default() {
            warn!(drift = ?drift, "significant clock drift detected");
        }

        Ok(())
    }
}

#[async_trait]
impl MarketData for PoloniexExchange {
    async fn fetch_quote(&self, pair: &str) -> Result<Quote> {
        let endpoint = format!("/markets/{}/ticker24h", pair_to_symbol(pair));

        let body = self
            .client
            .get(&endpoint, &[])
            .await
            .map_err(|e| map_client_error(e, pair))?;

        let ticker: TickerResponse = serde_json::from_slice(&body)
            .map_err(|e| ExchangeError::Api(format!("parse ticker for {}: {}", pair, e)))?;

        let quote = ticker.to_quote();
        debug!(pair = %pair, last = ?quote.last, volume = ?quote.volume, "fetched quote");

        Ok(quote)
    }

    async fn fetch_candles(
        &self,
        pair: &str,
        timeframe: Duration,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let interval =
            timeframe_to_interval(timeframe).ok_or(ExchangeError::UnsupportedTimeframe(timeframe))?;

        let endpoint = format!("/markets/{}/candles", pair_to_symbol(pair));
        let params = candle_query(interval, timeframe, since, limit)?;

        let body = self
            .client
            .get(&endpoint, &params)
            .await
            .map_err(|e| map_client_error(e, pair))?;

        let rows: Vec<Vec<Value>> = serde_json::from_slice(&body)
            .map_err(|e| ExchangeError::Api(format!("parse candles for {}: {}", pair, e)))?;

        let candles = parse_candle_rows(&rows)?;

        debug!(
            pair = %pair,
            since = %since,
            requested = limit,
            received = candles.len(),
            "fetched candles"
        );

        Ok(candles)
    }

}

/// Builds the query for one candle page covering
/// `[since, since + limit * timeframe)`.
///
/// A limit above what the endpoint serves is an error rather than a silent
/// clamp, since callers detect exhaustion by comparing the page length with
/// the limit they asked for.
fn candle_query(
    interval: &str,
    timeframe: Duration,
    since: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<(&'static str, String)>> {
    if limit == 0 || limit > MAX_CANDLES_PER_REQUEST {
        return Err(ExchangeError::InvalidLimit {
            limit,
            max: MAX_CANDLES_PER_REQUEST,
        });
    }

    let start_ms = since.timestamp_millis();
    let span_ms = i64::try_from(timeframe.as_millis())
        .unwrap_or(i64::MAX)
        .saturating_mul(i64::from(limit));
    let end_ms = start_ms.saturating_add(span_ms).saturating_sub(1);

    Ok(vec![
        ("interval", interval.to_string()),
        ("startTime", start_ms.to_string()),
        ("endTime", end_ms.to_string()),
        ("limit", limit.to_string()),
    ])
}

/// Poloniex 24h ticker response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    #[allow(dead_code)]
    symbol: String,
    /// Last trade price of the window.
    close: String,
    /// Base asset quantity traded.
    quantity: String,
    ts: i64,
}

impl TickerResponse {
    fn to_quote(&self) -> Quote {
        Quote {
            last: parse_number(&self.close),
            volume: parse_number(&self.quantity),
            timestamp: DateTime::<Utc>::from_timestamp_millis(self.ts).unwrap_or_else(Utc::now),
        }
    }
}

/// Parses candle rows into candles sorted by open time.
fn parse_candle_rows(rows: &[Vec<Value>]) -> Result<Vec<Candle>> {
    let mut candles = rows
        .iter()
        .map(|row| -> Result<Candle> {
            let close = row
                .get(CANDLE_CLOSE_INDEX)
                .and_then(value_as_f64)
                .ok_or_else(|| ExchangeError::Api(format!("candle without close: {:?}", row)))?;

            let open_time = row
                .get(CANDLE_START_TIME_INDEX)
                .and_then(value_as_i64)
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| ExchangeError::Api(format!("candle without start time: {:?}", row)))?;

            Ok(Candle::new(open_time, close))
        })
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => parse_number(s),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Maps Poloniex client errors to exchange errors.
fn map_client_error(err: ClientError, pair: &str) -> ExchangeError {
    match err {
        ClientError::Api(api_err) => match api_err.code {
            21601 | 404 => ExchangeError::PairNotSupported(pair.to_string()),
            _ => ExchangeError::Api(format!("poloniex error for {}: {}", pair, api_err)),
        },
        ClientError::Request(e) if e.is_connect() || e.is_timeout() => {
            ExchangeError::Connection(format!("{}: {}", pair, e))
        }
        other => ExchangeError::Api(format!("{}", other)),
    }
}
