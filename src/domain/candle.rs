//! Historical candle data and time-aligned triangle records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Snapshot;

/// Candle is a single OHLC bucket; only the close is consumed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close: f64,
}

impl Candle {
    pub fn new(open_time: DateTime<Utc>, close: f64) -> Self {
        Self { open_time, close }
    }
}

/// AlignedRecord is a snapshot built from candles that exist for all three
/// legs at the same open time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlignedRecord(Snapshot);

impl AlignedRecord {
    pub fn new(timestamp: DateTime<Utc>, price_ac: f64, price_bc: f64, price_ba: f64) -> Self {
        Self(Snapshot::new(timestamp, price_ac, price_bc, price_ba))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0.timestamp
    }

    /// Millisecond key the record was aligned on.
    pub fn key(&self) -> i64 {
        self.0.timestamp.timestamp_millis()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.0
    }
}

impl From<AlignedRecord> for Snapshot {
    fn from(record: AlignedRecord) -> Self {
        record.0
    }
}
