//! Triangle arbitrage evaluation.
//!
//! Uses last prices as mid-market proxies: no bid/ask spread, fees or
//! slippage are modeled, so a flagged cycle is a signal rather than a
//! guaranteed profit.

use thiserror::Error;

use crate::domain::{ArbitrageSignal, Leg, Snapshot};

/// Default minimum gross return over 1.0 (0.2%).
pub const DEFAULT_THRESHOLD: f64 = 0.002;

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// A leg price is zero, negative or not a number.
    #[error("missing price for leg {leg}: {value}")]
    MissingPrice { leg: Leg, value: f64 },
}

/// Returns the two round-trip factors (cycle1, cycle2) of a snapshot.
///
/// cycle1 = p_bc / (p_ac * p_ba), and cycle2 is its reciprocal.
pub fn cycle_factors(snapshot: &Snapshot) -> Result<(f64, f64), EvaluationError> {
    if let Some(leg) = snapshot.invalid_leg() {
        return Err(EvaluationError::MissingPrice {
            leg,
            value: snapshot.price(leg),
        });
    }

    let cycle1 = snapshot.price_bc / (snapshot.price_ac * snapshot.price_ba);
    let cycle2 = (snapshot.price_ac * snapshot.price_ba) / snapshot.price_bc;

    Ok((cycle1, cycle2))
}

/// Evaluates a snapshot against a threshold.
///
/// A cycle is an opportunity when its factor is strictly greater than
/// `1 + threshold`.
pub fn evaluate(snapshot: &Snapshot, threshold: f64) -> Result<ArbitrageSignal, EvaluationError> {
    let (cycle1, cycle2) = cycle_factors(snapshot)?;
    let hurdle = 1.0 + threshold;

    Ok(ArbitrageSignal {
        timestamp: snapshot.timestamp,
        price_ac: snapshot.price_ac,
        price_bc: snapshot.price_bc,
        price_ba: snapshot.price_ba,
        cycle1_factor: cycle1,
        cycle1_is_opportunity: cycle1 > hurdle,
        cycle2_factor: cycle2,
        cycle2_is_opportunity: cycle2 > hurdle,
        threshold,
    })
}
