//! Common utilities for exchange implementations.

use std::time::Duration;

/// Converts "BTC/USDT" to "BTC_USDT".
pub fn pair_to_symbol(pair: &str) -> String {
    pair.replace('/', "_")
}

/// Maps a candle timeframe to the Poloniex interval name.
pub fn timeframe_to_interval(timeframe: Duration) -> Option<&'static str> {
    let interval = match timeframe.as_secs() {
        60 => "MINUTE_1",
        300 => "MINUTE_5",
        600 => "MINUTE_10",
        900 => "MINUTE_15",
        1_800 => "MINUTE_30",
        3_600 => "HOUR_1",
        7_200 => "HOUR_2",
        14_400 => "HOUR_4",
        21_600 => "HOUR_6",
        43_200 => "HOUR_12",
        86_400 => "DAY_1",
        259_200 => "DAY_3",
        604_800 => "WEEK_1",
        _ => return None,
    };

    if timeframe.subsec_nanos() != 0 {
        return None;
    }

    Some(interval)
}

/// Parses a numeric string field, treating empty strings as missing.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
