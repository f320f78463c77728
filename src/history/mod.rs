//! Historical series building.
//!
//! Pages candle history for the three triangle pairs in bounded windows and
//! aligns them on shared open times. Windows are produced lazily and in
//! order, so memory stays bounded by one window regardless of the range.

mod merge;

pub use merge::merge_series;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::{Stream, StreamExt, stream};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::HistoryConfig;
use crate::domain::{AlignedRecord, Candle, Leg, Triangle};
use crate::exchanges::MarketData;
use crate::storage::{RecordSink, StorageError};

/// Default candle interval.
pub const DEFAULT_TIMEFRAME: Duration = Duration::from_secs(60);
/// Default candles requested per page.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
/// Largest page the candle endpoint serves. A larger limit would come back
/// short and end paging early.
pub const MAX_PAGE_LIMIT: u32 = 500;
/// Default window length (100 one-minute candles).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(100 * 60);

/// History errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The requested range or paging parameters cannot be built.
    #[error("invalid history request: {0}")]
    InvalidRequest(String),

    /// A window could not be written to its sink.
    #[error("sink error: {0}")]
    Sink(#[from] StorageError),
}

/// HistoryRequest describes a half-open range `[start, end)` to rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timeframe: Duration,
    pub page_limit: u32,
    pub window: Duration,
}

impl HistoryRequest {
    /// Creates a request over `[start, end)` with default paging.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            timeframe: DEFAULT_TIMEFRAME,
            page_limit: DEFAULT_PAGE_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }

    /// Builds a request from configuration; an unset end means `now`.
    pub fn from_config(config: &HistoryConfig, now: DateTime<Utc>) -> Result<Self, HistoryError> {
        let start = config
            .start
            .ok_or_else(|| HistoryError::InvalidRequest("history.start is required".into()))?;

        let mut request = Self::new(start, config.end.unwrap_or(now));
        if !config.timeframe.is_zero() {
            request.timeframe = config.timeframe;
        }
        if let Some(limit) = config.page_limit {
            request.page_limit = limit;
        }
        if !config.window.is_zero() {
            request.window = config.window;
        }

        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.start >= self.end {
            return Err(HistoryError::InvalidRequest(format!(
                "start {} must be before end {}",
                self.start, self.end
            )));
        }
        if self.timeframe.is_zero() {
            return Err(HistoryError::InvalidRequest("timeframe must be positive".into()));
        }
        if self.window.is_zero() {
            return Err(HistoryError::InvalidRequest("window must be positive".into()));
        }
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(HistoryError::InvalidRequest(format!(
                "page_limit {} is not in 1..={}",
                self.page_limit, MAX_PAGE_LIMIT
            )));
        }
        Ok(())
    }

    /// Partitions `[start, end)` into consecutive windows, the last one
    /// clipped to `end`.
    pub fn windows(&self) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, HistoryError> {
        self.validate()?;

        let step = TimeDelta::from_std(self.window)
            .map_err(|e| HistoryError::InvalidRequest(format!("window: {}", e)))?;

        let mut windows = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = cursor
                .checked_add_signed(step)
                .map_or(self.end, |t| t.min(self.end));
            windows.push((cursor, next));
            cursor = next;
        }
        Ok(windows)
    }
}

/// WindowBatch is the complete output of one window.
#[derive(Debug, Clone)]
pub struct WindowBatch {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub records: Vec<AlignedRecord>,
    /// Pairs whose paging stopped on a fetch failure.
    pub failed_pairs: Vec<String>,
}

impl WindowBatch {
    pub fn is_degraded(&self) -> bool {
        !self.failed_pairs.is_empty()
    }
}

/// BuildSummary reports what a build wrote to its sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub windows: usize,
    pub records: usize,
    pub degraded_windows: usize,
    /// True when the build stopped before the last window.
    pub aborted: bool,
}

/// HistoricalSeriesBuilder rebuilds aligned triangle history from candles.
pub struct HistoricalSeriesBuilder {
    market: Arc<dyn MarketData>,
    triangle: Triangle,
}

impl HistoricalSeriesBuilder {
    pub fn new(market: Arc<dyn MarketData>, triangle: Triangle) -> Self {
        Self { market, triangle }
    }

    /// Returns a lazy stream of window batches.
    ///
    /// Nothing is fetched until the stream is polled; dropping it cancels the
    /// build after the window in flight.
    pub fn stream(
        &self,
        request: HistoryRequest,
    ) -> Result<impl Stream<Item = WindowBatch> + '_, HistoryError> {
        let windows = request.windows()?.into_iter();

        Ok(stream::unfold(
            (windows, request),
            move |(mut windows, request)| async move {
                let (start, end) = windows.next()?;
                let batch = self.fetch_window(&request, start, end).await;
                Some((batch, (windows, request)))
            },
        ))
    }

    /// Builds the whole range into memory.
    pub async fn build(&self, request: HistoryRequest) -> Result<Vec<AlignedRecord>, HistoryError> {
        let mut records = Vec::new();
        let running = AtomicBool::new(true);
        self.build_into(request, &mut records, &running).await?;
        Ok(records)
    }

    /// Writes every window to `sink` in order.
    ///
    /// `running` is checked before each window; clearing it stops the build
    /// with every already-written window intact.
    pub async fn build_into<S>(
        &self,
        request: HistoryRequest,
        sink: &mut S,
        running: &AtomicBool,
    ) -> Result<BuildSummary, HistoryError>
    where
        S: RecordSink + ?Sized,
    {
        let total = request.windows()?.len();
        let batches = self.stream(request)?;
        let mut batches = std::pin::pin!(batches);
        let mut summary = BuildSummary::default();

        loop {
            if !running.load(Ordering::SeqCst) {
                summary.aborted = summary.windows < total;
                break;
            }

            let Some(batch) = batches.next().await else {
                break;
            };

            sink.write_window(&batch.records).await?;

            summary.windows += 1;
            summary.records += batch.records.len();
            if batch.is_degraded() {
                summary.degraded_windows += 1;
            }

            info!(
                window = summary.windows,
                of = total,
                start = %batch.start,
                end = %batch.end,
                records = batch.records.len(),
                degraded = batch.is_degraded(),
                "window written"
            );
        }

        if summary.aborted {
            warn!(
                windows = summary.windows,
                of = total,
                "history build aborted"
            );
        }

        Ok(summary)
    }

    async fn fetch_window(
        &self,
        request: &HistoryRequest,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WindowBatch {
        let mut failed_pairs = Vec::new();
        let mut series: [Vec<Candle>; 3] = Default::default();

        for (slot, leg) in series.iter_mut().zip(Leg::ALL) {
            let pair = self.triangle.pair(leg);
            let (candles, failed) = self.fetch_pair(pair, request, start, end).await;
            if failed {
                failed_pairs.push(pair.to_string());
            }
            *slot = candles;
        }

        let [ac, bc, ba] = &series;
        let records = merge_series(ac, bc, ba);

        WindowBatch {
            start,
            end,
            records,
            failed_pairs,
        }
    }

    /// Pages one pair through `[start, end)`. Returns the candles collected
    /// and whether paging stopped on an error.
    async fn fetch_pair(
        &self,
        pair: &str,
        request: &HistoryRequest,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (Vec<Candle>, bool) {
        let limit = request.page_limit;
        let mut cursor = start;
        let mut candles = Vec::new();

        while cursor < end {
            let page = match self
                .market
                .fetch_candles(pair, request.timeframe, cursor, limit)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        pair = %pair,
                        since = %cursor,
                        error = %e,
                        "candle fetch failed, window degraded"
                    );
                    return (candles, true);
                }
            };

            let page_len = page.len();
            let Some(last_open) = page.last().map(|c| c.open_time) else {
                break;
            };

            debug!(
                pair = %pair,
                since = %cursor,
                candles = page_len,
                "candle page"
            );

            candles.extend(
                page.into_iter()
                    .filter(|c| c.open_time >= start && c.open_time < end),
            );

            let next = last_open + TimeDelta::milliseconds(1);
            if next <= cursor || page_len < limit as usize {
                break;
            }
            cursor = next;
        }

        (candles, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::mock::MockMarketData;
    use chrono::TimeZone;

    const MINUTE: i64 = 60_000;

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn minutes(from: i64, to: i64) -> Vec<(i64, f64)> {
        (from..to).map(|m| (m * MINUTE, 1.0 + m as f64)).collect()
    }

    fn request(start_min: i64, end_min: i64, page_limit: u32, window_min: u64) -> HistoryRequest {
        HistoryRequest {
            start: t(start_min * MINUTE),
            end: t(end_min * MINUTE),
            timeframe: Duration::from_secs(60),
            page_limit,
            window: Duration::from_secs(window_min * 60),
        }
    }

    fn market(ac: &[(i64, f64)], bc: &[(i64, f64)], ba: &[(i64, f64)]) -> MockMarketData {
        MockMarketData::new()
            .with_candles("BTC/USDT", ac)
            .with_candles("ETH/USDT", bc)
            .with_candles("ETH/BTC", ba)
    }

    #[test]
    fn test_windows_partition_and_clip() {
        let windows = request(0, 25, 100, 10).windows().unwrap();

        assert_eq!(
            windows,
            vec![
                (t(0), t(10 * MINUTE)),
                (t(10 * MINUTE), t(20 * MINUTE)),
                (t(20 * MINUTE), t(25 * MINUTE)),
            ]
        );
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let mut r = request(10, 10, 100, 10);
        assert!(matches!(r.validate(), Err(HistoryError::InvalidRequest(_))));

        r = request(0, 10, 0, 10);
        assert!(matches!(r.validate(), Err(HistoryError::InvalidRequest(_))));

        r = request(0, 10, MAX_PAGE_LIMIT + 1, 10);
        assert!(matches!(r.validate(), Err(HistoryError::InvalidRequest(_))));
        assert!(request(0, 10, MAX_PAGE_LIMIT, 10).validate().is_ok());

        r = request(0, 10, 100, 10);
        r.window = Duration::ZERO;
        assert!(matches!(r.windows(), Err(HistoryError::InvalidRequest(_))));

        r = request(0, 10, 100, 10);
        r.timeframe = Duration::ZERO;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_from_config_defaults() {
        let config = HistoryConfig {
            start: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            end: None,
            timeframe: Duration::ZERO,
            page_limit: None,
            window: Duration::ZERO,
        };
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

        let r = HistoryRequest::from_config(&config, now).unwrap();
        assert_eq!(r.end, now);
        assert_eq!(r.timeframe, DEFAULT_TIMEFRAME);
        assert_eq!(r.page_limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(r.window, DEFAULT_WINDOW);
    }

    #[test]
    fn test_from_config_requires_start() {
        let config = HistoryConfig {
            start: None,
            end: None,
            timeframe: Duration::ZERO,
            page_limit: None,
            window: Duration::ZERO,
        };
        assert!(matches!(
            HistoryRequest::from_config(&config, Utc::now()),
            Err(HistoryError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_build_aligns_common_minutes() {
        let market = market(&minutes(0, 30), &minutes(5, 30), &minutes(0, 20));
        let builder = HistoricalSeriesBuilder::new(Arc::new(market), Triangle::default());

        let records = builder.build(request(0, 30, 100, 10)).await.unwrap();

        let keys: Vec<i64> = records.iter().map(|r| r.key() / MINUTE).collect();
        assert_eq!(keys, (5..20).collect::<Vec<_>>());
        assert!(records.windows(2).all(|w| w[0].key() < w[1].key()));
    }

    #[tokio::test]
    async fn test_build_excludes_range_end() {
        let candles = minutes(0, 40);
        let market = market(&candles, &candles, &candles);
        let builder = HistoricalSeriesBuilder::new(Arc::new(market), Triangle::default());

        let records = builder.build(request(0, 25, 100, 10)).await.unwrap();

        assert_eq!(records.len(), 25);
        assert_eq!(records.last().unwrap().key(), 24 * MINUTE);
    }

    #[tokio::test]
    async fn test_paging_advances_cursor_past_last_candle() {
        let candles = minutes(0, 10);
        let market = Arc::new(market(&candles, &candles, &candles));
        let builder = HistoricalSeriesBuilder::new(market.clone(), Triangle::default());

        let records = builder.build(request(0, 10, 4, 60)).await.unwrap();
        assert_eq!(records.len(), 10);

        let cursors: Vec<i64> = market
            .candle_calls()
            .into_iter()
            .filter(|(pair, _, _)| pair == "BTC/USDT")
            .map(|(_, since, limit)| {
                assert_eq!(limit, 4);
                since.timestamp_millis()
            })
            .collect();

        // pages of 4, 4, then a short page of 2 stops paging
        assert_eq!(cursors, vec![0, 3 * MINUTE + 1, 7 * MINUTE + 1]);
    }

    #[tokio::test]
    async fn test_paging_stops_once_cursor_passes_window_end() {
        let candles = minutes(0, 100);
        let market = Arc::new(market(&candles, &candles, &candles));
        let builder = HistoricalSeriesBuilder::new(market.clone(), Triangle::default());

        let records = builder.build(request(0, 6, 3, 6)).await.unwrap();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.key() < 6 * MINUTE));

        // the third page starts inside the window but lands past its end
        let calls: Vec<i64> = market
            .candle_calls()
            .iter()
            .filter(|(pair, _, _)| pair == "ETH/BTC")
            .map(|(_, since, _)| since.timestamp_millis())
            .collect();
        assert_eq!(calls, vec![0, 2 * MINUTE + 1, 5 * MINUTE + 1]);
    }

    #[tokio::test]
    async fn test_failed_pair_degrades_window_only() {
        let candles = minutes(0, 20);
        let market = market(&candles, &candles, &candles).with_failing_candles("ETH/USDT");
        let builder = HistoricalSeriesBuilder::new(Arc::new(market), Triangle::default());

        let mut sink: Vec<AlignedRecord> = Vec::new();
        let running = AtomicBool::new(true);
        let summary = builder
            .build_into(request(0, 20, 100, 10), &mut sink, &running)
            .await
            .unwrap();

        assert!(sink.is_empty());
        assert_eq!(summary.windows, 2);
        assert_eq!(summary.degraded_windows, 2);
        assert!(!summary.aborted);
    }

    #[tokio::test]
    async fn test_failure_mid_paging_keeps_earlier_pages() {
        let candles = minutes(0, 10);
        let market = Arc::new(
            market(&candles, &candles, &candles).with_candles_failing_after("ETH/USDT", 1),
        );
        let builder = HistoricalSeriesBuilder::new(market.clone(), Triangle::default());

        let batches: Vec<WindowBatch> = builder
            .stream(request(0, 10, 4, 10))
            .unwrap()
            .collect()
            .await;

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert!(batch.is_degraded());
        assert_eq!(batch.failed_pairs, vec!["ETH/USDT".to_string()]);

        // the first page of ETH/USDT survives the failure of the second
        let keys: Vec<i64> = batch.records.iter().map(|r| r.key() / MINUTE).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);

        let calls = market
            .candle_calls()
            .iter()
            .filter(|(pair, _, _)| pair == "ETH/USDT")
            .count();
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_stream_yields_windows_in_order() {
        let candles = minutes(0, 30);
        let market = market(&candles, &candles, &candles);
        let builder = HistoricalSeriesBuilder::new(Arc::new(market), Triangle::default());

        let batches: Vec<WindowBatch> = builder
            .stream(request(0, 30, 100, 10))
            .unwrap()
            .collect()
            .await;

        assert_eq!(batches.len(), 3);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.records.len(), 10);
            assert_eq!(batch.records[0].key(), i as i64 * 10 * MINUTE);
            assert!(!batch.is_degraded());
        }
    }

    #[tokio::test]
    async fn test_cleared_flag_aborts_before_fetching() {
        let candles = minutes(0, 30);
        let market = Arc::new(market(&candles, &candles, &candles));
        let builder = HistoricalSeriesBuilder::new(market.clone(), Triangle::default());

        let mut sink: Vec<AlignedRecord> = Vec::new();
        let running = AtomicBool::new(false);
        let summary = builder
            .build_into(request(0, 30, 100, 10), &mut sink, &running)
            .await
            .unwrap();

        assert!(summary.aborted);
        assert_eq!(summary.windows, 0);
        assert!(market.candle_calls().is_empty());
    }
}
