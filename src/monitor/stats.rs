//! Runtime statistics for the monitor.

use crate::domain::{ArbitrageSignal, Direction};

/// Runtime statistics for the monitor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub detection_cycles: u64,
    pub failed_reads: u64,
    pub evaluation_failures: u64,
    pub opportunities_detected: u64,
    pub cycle1_opportunities: u64,
    pub cycle2_opportunities: u64,
    pub signals_saved: u64,
    pub storage_failures: u64,
    /// Largest flagged factor seen so far, 0 until the first opportunity.
    pub best_factor: f64,
}

impl Stats {
    /// Counts the opportunity carried by a signal, if any.
    pub fn record_signal(&mut self, signal: &ArbitrageSignal) {
        let Some((direction, factor)) = signal.best_opportunity() else {
            return;
        };

        self.opportunities_detected += 1;
        match direction {
            Direction::Cycle1 => self.cycle1_opportunities += 1,
            Direction::Cycle2 => self.cycle2_opportunities += 1,
        }
        self.best_factor = self.best_factor.max(factor);
    }
}
