//! Backtest simulation over aligned historical records.
//!
//! Each record is evaluated as if it were a live snapshot; flagged cycles
//! are assumed to fill at the observed prices with no fees or slippage.

mod stats;

pub use stats::{MINUTES_PER_YEAR, max_drawdown, mean, sharpe_ratio, std_dev};

use thiserror::Error;
use tracing::{debug, info};

use crate::arbitrage::{self, DEFAULT_THRESHOLD};
use crate::config::Config;
use crate::domain::{AlignedRecord, BacktestResult, PortfolioState};

/// Default starting portfolio value.
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
/// Default fraction of the portfolio allocated per trade.
pub const DEFAULT_TRADE_FRACTION: f64 = 0.1;

/// Backtest errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("no records to backtest")]
    EmptyInput,

    #[error("invalid backtest parameter: {0}")]
    InvalidParameter(String),
}

/// BacktestParams holds the knobs of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestParams {
    /// Fraction of the portfolio put into each trade, in (0, 1].
    pub trade_fraction: f64,
    /// Detection threshold, as for live evaluation.
    pub threshold: f64,
    pub initial_capital: f64,
    /// Steps per year used to annualize the Sharpe ratio.
    pub steps_per_year: u64,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            trade_fraction: DEFAULT_TRADE_FRACTION,
            threshold: DEFAULT_THRESHOLD,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            steps_per_year: MINUTES_PER_YEAR,
        }
    }
}

impl BacktestParams {
    pub fn new(trade_fraction: f64, threshold: f64) -> Self {
        Self {
            trade_fraction,
            threshold,
            ..Self::default()
        }
    }

    /// Reads the `backtest` and `arbitrage` sections, defaulting what is unset.
    pub fn from_config(config: &Config) -> Self {
        let mut params = Self::default();

        if let Some(ref arbitrage) = config.arbitrage {
            if let Some(threshold) = arbitrage.threshold {
                params.threshold = threshold;
            }
        }

        if let Some(ref backtest) = config.backtest {
            if let Some(fraction) = backtest.trade_fraction {
                params.trade_fraction = fraction;
            }
            if let Some(capital) = backtest.initial_capital {
                params.initial_capital = capital;
            }
            if let Some(steps) = backtest.steps_per_year {
                params.steps_per_year = steps;
            }
        }

        params
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.trade_fraction.is_nan() || self.trade_fraction <= 0.0 || self.trade_fraction > 1.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "trade_fraction {} is not in (0, 1]",
                self.trade_fraction
            )));
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "threshold {} must be non-negative",
                self.threshold
            )));
        }
        if self.initial_capital.is_nan() || self.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "initial_capital {} must be positive",
                self.initial_capital
            )));
        }
        if self.steps_per_year == 0 {
            return Err(BacktestError::InvalidParameter(
                "steps_per_year must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// BacktestSimulator replays aligned records through the evaluator.
pub struct BacktestSimulator {
    params: BacktestParams,
}

impl BacktestSimulator {
    pub fn new(params: BacktestParams) -> Result<Self, BacktestError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Simulates the records in order and summarizes the run.
    ///
    /// A record that fails evaluation counts as a step with zero return.
    pub fn run(&self, records: &[AlignedRecord]) -> Result<BacktestResult, BacktestError> {
        if records.is_empty() {
            return Err(BacktestError::EmptyInput);
        }

        let params = &self.params;
        let mut state = PortfolioState::new(params.initial_capital);
        let mut skipped = 0usize;

        for record in records {
            let signal = match arbitrage::evaluate(record.snapshot(), params.threshold) {
                Ok(signal) => signal,
                Err(e) => {
                    debug!(timestamp = %record.timestamp(), error = %e, "record skipped");
                    skipped += 1;
                    state.hold();
                    continue;
                }
            };

            match signal.best_opportunity() {
                Some((direction, factor)) => {
                    let trade_return = state.trade(params.trade_fraction, factor);
                    debug!(
                        timestamp = %record.timestamp(),
                        direction = %direction,
                        factor = factor,
                        trade_return = trade_return,
                        value = state.value,
                        "simulated trade"
                    );
                }
                None => state.hold(),
            }
        }

        let average_return = mean(&state.trade_returns);
        let std_return = std_dev(&state.trade_returns);

        let result = BacktestResult {
            initial_capital: params.initial_capital,
            final_value: state.value,
            cumulative_return: state.value / params.initial_capital - 1.0,
            average_return,
            std_return,
            sharpe_ratio: sharpe_ratio(average_return, std_return, params.steps_per_year),
            max_drawdown: max_drawdown(&state.history),
            trades: state.trades,
            portfolio_history: state.history,
            trade_returns: state.trade_returns,
        };

        info!(
            records = records.len(),
            trades = result.trades,
            skipped = skipped,
            final_value = result.final_value,
            cumulative_return = result.cumulative_return,
            sharpe_ratio = result.sharpe_ratio,
            max_drawdown = result.max_drawdown,
            "Backtest completed"
        );

        Ok(result)
    }
}

/// Runs a backtest with the given parameters.
pub fn run(records: &[AlignedRecord], params: BacktestParams) -> Result<BacktestResult, BacktestError> {
    BacktestSimulator::new(params)?.run(records)
}
