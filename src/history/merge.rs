//! Alignment of per-pair candle series into triangle records.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{AlignedRecord, Candle};

/// Intersects three candle series on their open-time millisecond keys.
///
/// Keys missing from any series are dropped, as are records with a
/// non-positive close on any leg. Output is ascending with unique keys;
/// a key repeated within one series keeps its last close.
pub fn merge_series(ac: &[Candle], bc: &[Candle], ba: &[Candle]) -> Vec<AlignedRecord> {
    let ac = keyed(ac);
    let bc = keyed(bc);
    let ba = keyed(ba);

    let mut records = Vec::with_capacity(ac.len().min(bc.len()).min(ba.len()));
    for (&key, &(open_time, price_ac)) in &ac {
        let (Some(&(_, price_bc)), Some(&(_, price_ba))) = (bc.get(&key), ba.get(&key)) else {
            continue;
        };

        let record = AlignedRecord::new(open_time, price_ac, price_bc, price_ba);
        if let Some(leg) = record.snapshot().invalid_leg() {
            debug!(key, leg = %leg, "dropping record with invalid price");
            continue;
        }
        records.push(record);
    }

    records
}

fn keyed(series: &[Candle]) -> BTreeMap<i64, (chrono::DateTime<chrono::Utc>, f64)> {
    series
        .iter()
        .map(|c| (c.open_time.timestamp_millis(), (c.open_time, c.close)))
        .collect()
}
