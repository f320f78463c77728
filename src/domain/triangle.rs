//! Currency triangle definition.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Triangle validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriangleError {
    #[error("invalid pair {0}: expected BASE/QUOTE")]
    InvalidPair(String),
    #[error("pairs {ac}, {bc}, {ba} do not form an A/C, B/C, B/A triangle")]
    NotATriangle { ac: String, bc: String, ba: String },
}

/// Leg identifies one of the three pairs of the triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// A/C, e.g. BTC/USDT.
    Ac,
    /// B/C, e.g. ETH/USDT.
    Bc,
    /// B/A, e.g. ETH/BTC.
    Ba,
}

impl Leg {
    /// All legs in fetch order.
    pub const ALL: [Leg; 3] = [Leg::Ac, Leg::Bc, Leg::Ba];
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Ac => write!(f, "ac"),
            Leg::Bc => write!(f, "bc"),
            Leg::Ba => write!(f, "ba"),
        }
    }
}

/// Triangle holds the three spot pairs in "BASE/QUOTE" format.
///
/// With assets A, B and C the pairs are A/C, B/C and B/A, so that
/// BTC/USDT, ETH/USDT, ETH/BTC is a triangle with A=BTC, B=ETH, C=USDT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Triangle {
    ac: String,
    bc: String,
    ba: String,
}

impl Triangle {
    /// Creates a triangle after checking that the legs share assets correctly.
    pub fn new(
        ac: impl Into<String>,
        bc: impl Into<String>,
        ba: impl Into<String>,
    ) -> Result<Self, TriangleError> {
        let (ac, bc, ba) = (ac.into(), bc.into(), ba.into());

        let (a, c) = split_pair(&ac)?;
        let (b, c2) = split_pair(&bc)?;
        let (b2, a2) = split_pair(&ba)?;

        let linked = c == c2 && b == b2 && a == a2;
        let distinct = a != b && b != c && a != c;
        if !linked || !distinct {
            return Err(TriangleError::NotATriangle { ac, bc, ba });
        }

        Ok(Self { ac, bc, ba })
    }

    /// Returns the pair name for a leg.
    pub fn pair(&self, leg: Leg) -> &str {
        match leg {
            Leg::Ac => &self.ac,
            Leg::Bc => &self.bc,
            Leg::Ba => &self.ba,
        }
    }

    /// Returns the pairs in leg order (A/C, B/C, B/A).
    pub fn pairs(&self) -> [&str; 3] {
        [&self.ac, &self.bc, &self.ba]
    }
}

impl Default for Triangle {
    fn default() -> Self {
        Self {
            ac: "BTC/USDT".to_string(),
            bc: "ETH/USDT".to_string(),
            ba: "ETH/BTC".to_string(),
        }
    }
}

fn split_pair(pair: &str) -> Result<(&str, &str), TriangleError> {
    match pair.split_once('/') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('/') => {
            Ok((base, quote))
        }
        _ => Err(TriangleError::InvalidPair(pair.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_triangle_is_valid() {
        let t = Triangle::default();
        assert_eq!(
            Triangle::new(t.pair(Leg::Ac), t.pair(Leg::Bc), t.pair(Leg::Ba)),
            Ok(t.clone())
        );
    }

    #[test]
    fn test_pairs_in_leg_order() {
        let t = Triangle::new("SOL/USDC", "ETH/USDC", "ETH/SOL").unwrap();
        assert_eq!(t.pairs(), ["SOL/USDC", "ETH/USDC", "ETH/SOL"]);
    }

    #[test]
    fn test_rejects_malformed_pair() {
        let err = Triangle::new("BTCUSDT", "ETH/USDT", "ETH/BTC").unwrap_err();
        assert_eq!(err, TriangleError::InvalidPair("BTCUSDT".to_string()));
    }

    #[test]
    fn test_rejects_unlinked_legs() {
        // B/A leg inverted
        let err = Triangle::new("BTC/USDT", "ETH/USDT", "BTC/ETH").unwrap_err();
        assert!(matches!(err, TriangleError::NotATriangle { .. }));
    }

    #[test]
    fn test_rejects_repeated_asset() {
        let err = Triangle::new("BTC/USDT", "BTC/USDT", "BTC/BTC").unwrap_err();
        assert!(matches!(err, TriangleError::NotATriangle { .. }));
    }
}
