//! Exchange configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Settings for a single market-data source.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Whether this exchange should be used.
    #[serde(default)]
    pub enabled: bool,
    /// REST API base URL; the exchange's production endpoint when unset.
    /// Overridden by the `{EXCHANGE}_BASE_URL` environment variable.
    pub base_url: Option<String>,
    /// Maximum API requests per rate window.
    pub rate_limit: Option<i64>,
    /// Length of the rate window (default: 1s).
    #[serde(default, with = "duration")]
    pub rate_window: Duration,
    /// HTTP request timeout (default: 10s).
    #[serde(default, with = "duration")]
    pub request_timeout: Duration,
}
