//! Domain models for triangle arbitrage detection and backtesting.

mod backtest;
mod candle;
mod signal;
mod snapshot;
mod triangle;

pub use backtest::{BacktestResult, PortfolioState};
pub use candle::{AlignedRecord, Candle};
pub use signal::{ArbitrageSignal, Direction};
pub use snapshot::{Quote, Snapshot, TriangleQuotes};
pub use triangle::{Leg, Triangle};
