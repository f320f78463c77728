//! Arbitrage signal domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a round trip through the triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// C -> A -> B -> C: buy A with C, buy B with A, sell B for C.
    Cycle1,
    /// C -> B -> A -> C: the reverse round trip.
    Cycle2,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Cycle1 => write!(f, "cycle1"),
            Direction::Cycle2 => write!(f, "cycle2"),
        }
    }
}

/// ArbitrageSignal is the evaluation of one snapshot against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    pub timestamp: DateTime<Utc>,
    pub price_ac: f64,
    pub price_bc: f64,
    pub price_ba: f64,
    /// Round-trip factor for cycle 1: p_bc / (p_ac * p_ba).
    pub cycle1_factor: f64,
    pub cycle1_is_opportunity: bool,
    /// Round-trip factor for cycle 2, the reciprocal of cycle 1.
    pub cycle2_factor: f64,
    pub cycle2_is_opportunity: bool,
    /// Minimum gross return over 1.0 required to flag a cycle.
    pub threshold: f64,
}

impl ArbitrageSignal {
    /// Returns true if either direction is flagged.
    pub fn has_opportunity(&self) -> bool {
        self.cycle1_is_opportunity || self.cycle2_is_opportunity
    }

    /// Returns the flagged direction with the larger factor, if any.
    pub fn best_opportunity(&self) -> Option<(Direction, f64)> {
        let flagged = [
            (Direction::Cycle1, self.cycle1_factor, self.cycle1_is_opportunity),
            (Direction::Cycle2, self.cycle2_factor, self.cycle2_is_opportunity),
        ];

        flagged
            .into_iter()
            .filter(|(_, _, is_opportunity)| *is_opportunity)
            .map(|(direction, factor, _)| (direction, factor))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}
