//! Return and drawdown statistics.

/// One-minute bars in a 365-day year.
pub const MINUTES_PER_YEAR: u64 = 525_600;

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Annualized Sharpe ratio with a zero risk-free rate.
///
/// Returns +inf when `std` is zero, whatever the mean.
pub fn sharpe_ratio(mean: f64, std: f64, steps_per_year: u64) -> f64 {
    if std == 0.0 {
        return f64::INFINITY;
    }
    mean / std * (steps_per_year as f64).sqrt()
}

/// Largest relative decline from a running peak, in [0, 1].
pub fn max_drawdown(history: &[f64]) -> f64 {
    let Some(&first) = history.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut worst: f64 = 0.0;
    for &value in history {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst.clamp(0.0, 1.0)
}
