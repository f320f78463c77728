//! Portfolio state and summary produced by a backtest run.

use serde::{Deserialize, Serialize};

/// PortfolioState is the single mutable state of a backtest.
///
/// The history starts with the initial capital and grows by exactly one
/// entry per processed record, as do the trade returns.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub value: f64,
    pub history: Vec<f64>,
    pub trade_returns: Vec<f64>,
    pub trades: usize,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            value: initial_capital,
            history: vec![initial_capital],
            trade_returns: Vec::new(),
            trades: 0,
        }
    }

    /// Carries the value forward with a zero return.
    pub fn hold(&mut self) {
        self.trade_returns.push(0.0);
        self.history.push(self.value);
    }

    /// Allocates `trade_fraction` of the portfolio to a round trip with the
    /// given cycle factor and returns the trade's return on prior capital.
    pub fn trade(&mut self, trade_fraction: f64, factor: f64) -> f64 {
        let profit_fraction = factor - 1.0;
        let trade_profit = self.value * trade_fraction * profit_fraction;
        self.value += trade_profit;

        let mut risked = self.value - trade_profit;
        if risked == 0.0 {
            risked = 1.0;
        }
        let trade_return = trade_profit / risked;

        self.trades += 1;
        self.trade_returns.push(trade_return);
        self.history.push(self.value);
        trade_return
    }
}

/// BacktestResult is the immutable summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_value: f64,
    /// Portfolio value before the first record and after each record.
    pub portfolio_history: Vec<f64>,
    /// Per-step returns, zero for steps without a trade.
    pub trade_returns: Vec<f64>,
    /// Number of steps where a trade was simulated.
    pub trades: usize,
    pub cumulative_return: f64,
    pub average_return: f64,
    pub std_return: f64,
    /// Annualized Sharpe ratio; +inf when returns have zero deviation.
    /// Written as the string `"inf"` in JSON.
    #[serde(with = "non_finite")]
    pub sharpe_ratio: f64,
    /// Largest relative decline from a running peak, in [0, 1].
    pub max_drawdown: f64,
}

/// Serde adapter that keeps non-finite floats readable in JSON.
///
/// Finite values stay numbers; infinities and NaN become `"inf"`, `"-inf"`
/// and `"NaN"`. Either form is accepted back.
mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text.parse::<f64>().map_err(|_| {
                de::Error::invalid_value(
                    de::Unexpected::Str(&text),
                    &"a number, \"inf\", \"-inf\" or \"NaN\"",
                )
            }),
        }
    }
}
