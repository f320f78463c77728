//! Configuration loading and validation.
//!
//! Uses serde_yaml to load YAML configuration files with support for
//! environment variable overrides of exchange endpoints.

mod app;
mod arbitrage;
mod duration;
mod error;
mod exchange;
mod history;
mod storage;

pub use app::AppConfig;
pub use arbitrage::{ArbitrageConfig, TriangleConfig};
pub use error::ConfigError;
pub use exchange::ExchangeConfig;
pub use history::{BacktestConfig, HistoryConfig};
pub use storage::StorageConfig;

use serde::Deserialize;
use std::{collections::HashMap, env, fs};

use crate::domain::Triangle;

/// Root configuration structure.
///
/// Required sections: app, exchanges, triangle.
/// Optional sections: arbitrage, history, backtest, storage.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application-level settings like name and environment.
    pub app: AppConfig,
    /// Maps exchange names to their configurations.
    pub exchanges: HashMap<String, ExchangeConfig>,
    /// The three pairs forming the triangle.
    pub triangle: TriangleConfig,
    /// Detection threshold and live polling (optional).
    pub arbitrage: Option<ArbitrageConfig>,
    /// Historical candle retrieval (optional).
    pub history: Option<HistoryConfig>,
    /// Backtest simulation (optional).
    pub backtest: Option<BacktestConfig>,
    /// Record and signal persistence (optional).
    pub storage: Option<StorageConfig>,
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Loads environment variables from a `.env` file (if exists) first, then
    /// applies `{EXCHANGE}_BASE_URL` overrides to enabled exchanges.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;

        config.load_overrides_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Apply endpoint overrides from environment variables.
    fn load_overrides_from_env(&mut self) {
        for (name, exchange) in self.exchanges.iter_mut() {
            if !exchange.enabled {
                continue;
            }

            let key = format!("{}_BASE_URL", name.to_uppercase());
            if let Ok(url) = env::var(&key) {
                if !url.is_empty() {
                    exchange.base_url = Some(url);
                }
            }
        }
    }

    /// Returns the validated triangle.
    pub fn triangle(&self) -> Result<Triangle, ConfigError> {
        Triangle::new(&self.triangle.ac, &self.triangle.bc, &self.triangle.ba)
            .map_err(|e| ConfigError::Validation(format!("triangle: {}", e)))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.is_empty() {
            return Err(ConfigError::Validation("app.name is required".into()));
        }

        if !self.exchanges.values().any(|e| e.enabled) {
            return Err(ConfigError::Validation(
                "at least one exchange must be enabled".into(),
            ));
        }

        self.triangle()?;

        if let Some(threshold) = self.arbitrage.as_ref().and_then(|a| a.threshold) {
            if threshold.is_nan() || threshold < 0.0 {
                return Err(ConfigError::Validation(
                    "arbitrage.threshold must be non-negative".into(),
                ));
            }
        }

        if let Some(ref history) = self.history {
            if let Some(limit) = history.page_limit {
                if limit == 0 {
                    return Err(ConfigError::Validation(
                        "history.page_limit must be positive".into(),
                    ));
                }
                if limit > crate::history::MAX_PAGE_LIMIT {
                    return Err(ConfigError::Validation(format!(
                        "history.page_limit must be at most {}",
                        crate::history::MAX_PAGE_LIMIT
                    )));
                }
            }

            if let (Some(start), Some(end)) = (history.start, history.end) {
                if start >= end {
                    return Err(ConfigError::Validation(
                        "history.start must be before history.end".into(),
                    ));
                }
            }
        }

        if let Some(ref backtest) = self.backtest {
            if let Some(fraction) = backtest.trade_fraction {
                if fraction.is_nan() || fraction <= 0.0 || fraction > 1.0 {
                    return Err(ConfigError::Validation(
                        "backtest.trade_fraction must be in (0, 1]".into(),
                    ));
                }
            }

            if let Some(capital) = backtest.initial_capital {
                if capital.is_nan() || capital <= 0.0 {
                    return Err(ConfigError::Validation(
                        "backtest.initial_capital must be positive".into(),
                    ));
                }
            }

            if backtest.steps_per_year == Some(0) {
                return Err(ConfigError::Validation(
                    "backtest.steps_per_year must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
