//! Live snapshot reading for the triangle.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Leg, Quote, Snapshot, Triangle, TriangleQuotes};
use crate::exchanges::MarketData;

/// Snapshot reader errors.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// A quote call failed or came back without a last price.
    #[error("quote unavailable for {pair}: {reason}")]
    QuoteUnavailable { pair: String, reason: String },
}

/// SnapshotReader reads the three legs of a triangle from a market data source.
///
/// Holds no state between reads; every call fetches all three quotes.
pub struct SnapshotReader {
    market: Arc<dyn MarketData>,
    triangle: Triangle,
}

impl SnapshotReader {
    pub fn new(market: Arc<dyn MarketData>, triangle: Triangle) -> Self {
        Self { market, triangle }
    }

    pub fn triangle(&self) -> &Triangle {
        &self.triangle
    }

    /// Reads last price and volume for every leg.
    ///
    /// Pairs are queried one after another; the first failure aborts the read.
    pub async fn read_quotes(&self) -> Result<TriangleQuotes, ReaderError> {
        let captured_at = Utc::now();

        let ac = self.read_leg(Leg::Ac).await?;
        let bc = self.read_leg(Leg::Bc).await?;
        let ba = self.read_leg(Leg::Ba).await?;

        Ok(TriangleQuotes {
            captured_at,
            ac,
            bc,
            ba,
        })
    }

    /// Reads a complete snapshot, or fails without a partial result.
    pub async fn read_snapshot(&self) -> Result<Snapshot, ReaderError> {
        let quotes = self.read_quotes().await?;
        self.to_snapshot(&quotes)
    }

    /// Builds a snapshot from quotes, requiring a last price on every leg.
    pub fn to_snapshot(&self, quotes: &TriangleQuotes) -> Result<Snapshot, ReaderError> {
        let last = |leg: Leg| {
            quotes
                .quote(leg)
                .last
                .ok_or_else(|| ReaderError::QuoteUnavailable {
                    pair: self.triangle.pair(leg).to_string(),
                    reason: "missing last price".to_string(),
                })
        };

        Ok(Snapshot::new(
            quotes.captured_at,
            last(Leg::Ac)?,
            last(Leg::Bc)?,
            last(Leg::Ba)?,
        ))
    }

    async fn read_leg(&self, leg: Leg) -> Result<Quote, ReaderError> {
        let pair = self.triangle.pair(leg);

        let quote = self
            .market
            .fetch_quote(pair)
            .await
            .map_err(|e| ReaderError::QuoteUnavailable {
                pair: pair.to_string(),
                reason: e.to_string(),
            })?;

        if quote.last.is_none() {
            return Err(ReaderError::QuoteUnavailable {
                pair: pair.to_string(),
                reason: "missing last price".to_string(),
            });
        }

        debug!(
            pair = %pair,
            last = ?quote.last,
            volume = ?quote.volume,
            "leg quote"
        );

        Ok(quote)
    }
}
