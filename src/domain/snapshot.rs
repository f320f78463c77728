//! Point-in-time price observations for the triangle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Leg;

/// Snapshot is one observation instant for the triangle.
///
/// Prices are last-trade (or candle close) prices used as mid-market proxies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    /// Price of A in C (e.g. BTC/USDT).
    pub price_ac: f64,
    /// Price of B in C (e.g. ETH/USDT).
    pub price_bc: f64,
    /// Price of B in A (e.g. ETH/BTC).
    pub price_ba: f64,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, price_ac: f64, price_bc: f64, price_ba: f64) -> Self {
        Self {
            timestamp,
            price_ac,
            price_bc,
            price_ba,
        }
    }

    /// Returns the price of a single leg.
    pub fn price(&self, leg: Leg) -> f64 {
        match leg {
            Leg::Ac => self.price_ac,
            Leg::Bc => self.price_bc,
            Leg::Ba => self.price_ba,
        }
    }

    /// Returns the first leg whose price is not a finite positive number.
    pub fn invalid_leg(&self) -> Option<Leg> {
        Leg::ALL
            .into_iter()
            .find(|&leg| !is_valid_price(self.price(leg)))
    }
}

/// Returns true for finite, strictly positive prices.
pub(crate) fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Quote is a ticker reading for a single pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Last trade price, if the exchange reported one.
    pub last: Option<f64>,
    /// Base asset volume over the ticker's rolling window.
    pub volume: Option<f64>,
    /// Exchange timestamp of the reading.
    pub timestamp: DateTime<Utc>,
}

/// TriangleQuotes holds one quote per leg plus the local capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleQuotes {
    pub captured_at: DateTime<Utc>,
    pub ac: Quote,
    pub bc: Quote,
    pub ba: Quote,
}

impl TriangleQuotes {
    pub fn quote(&self, leg: Leg) -> &Quote {
        match leg {
            Leg::Ac => &self.ac,
            Leg::Bc => &self.bc,
            Leg::Ba => &self.ba,
        }
    }
}
