//! Poloniex exchange integration.

mod client;
mod exchange;

pub use exchange::PoloniexExchange;
