//! HTTP client for the Poloniex public Spot API.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExchangeConfig;

/// Production Poloniex HTTP API endpoint.
const BASE_HTTP_API_URL: &str = "https://api.poloniex.com";

/// Default number of requests allowed per rate window.
const DEFAULT_RATE_LIMIT: i64 = 10;

/// Default rate window; market data endpoints allow bursts per second.
const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Default HTTP request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Poloniex API error.
#[derive(Debug, Error)]
#[error("poloniex api error {code}: {message}")]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Configuration for creating a new Client.
pub struct ClientConfig {
    pub base_url: String,
    pub rate_limit: i64,
    pub rate_window: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: Option<String>, rate_limit: i64) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| BASE_HTTP_API_URL.to_string()),
            rate_limit: if rate_limit > 0 {
                rate_limit
            } else {
                DEFAULT_RATE_LIMIT
            },
            rate_window: DEFAULT_RATE_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

struct RateLimitState {
    window_start: Instant,
}

/// HTTP client for the Poloniex public API.
/// Handles rate limiting and error responses.
pub struct Client {
    config: ClientConfig,
    http_client: HttpClient,
    request_count: AtomicI64,
    rate_limit_state: Mutex<RateLimitState>,
}

impl Client {
    /// Creates a new Poloniex API client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
            request_count: AtomicI64::new(0),
            rate_limit_state: Mutex::new(RateLimitState {
                window_start: Instant::now(),
            }),
        })
    }

    /// Creates a new Poloniex API client from exchange config.
    pub fn from_config(exchange_config: &ExchangeConfig) -> Result<Self> {
        let mut config = ClientConfig::new(
            exchange_config.base_url.clone(),
            exchange_config.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
        );
        if !exchange_config.rate_window.is_zero() {
            config.rate_window = exchange_config.rate_window;
        }
        if !exchange_config.request_timeout.is_zero() {
            config.request_timeout = exchange_config.request_timeout;
        }
        Self::new(config)
    }

    /// Sends a public GET request and returns the raw response body.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<u8>> {
        self.wait_for_rate_limit().await;

        let query: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = if query.is_empty() {
            format!("{}{}", self.config.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.config.base_url, endpoint, query)
        };

        debug!(endpoint = %endpoint, query = %query, "sending request");

        let response = self.http_client.get(&url).send().await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status.is_client_error() || status.is_server_error() {
            return Err(self.parse_error_response(status, &body));
        }

        Ok(body.to_vec())
    }

    /// Waits until a request slot is available in the current rate window.
    async fn wait_for_rate_limit(&self) {
        loop {
            let wait = {
                let mut state = self
                    .rate_limit_state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());

                let elapsed = state.window_start.elapsed();
                if elapsed >= self.config.rate_window {
                    self.request_count.store(0, Ordering::SeqCst);
                    state.window_start = Instant::now();
                }

                let current = self.request_count.load(Ordering::SeqCst);
                if current < self.config.rate_limit {
                    self.request_count.fetch_add(1, Ordering::SeqCst);
                    return;
                }

                self.config.rate_window.saturating_sub(elapsed)
            };

            debug!(wait = ?wait, limit = self.config.rate_limit, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Creates a ClientError from an error response.
    fn parse_error_response(&self, status: StatusCode, body: &[u8]) -> ClientError {
        #[derive(Deserialize)]
        struct ErrorResponse {
            code: Option<i32>,
            message: Option<String>,
        }

        let api_err = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(resp) => ApiError {
                code: resp.code.unwrap_or(status.as_u16() as i32),
                message: resp
                    .message
                    .unwrap_or_else(|| String::from_utf8_lossy(body).to_string()),
            },
            Err(_) => ApiError {
                code: status.as_u16() as i32,
                message: String::from_utf8_lossy(body).to_string(),
            },
        };

        warn!(code = api_err.code, message = %api_err.message, "api error");

        ClientError::Api(api_err)
    }

    /// Fetches the current server time from Poloniex.
    pub async fn get_server_time(&self) -> Result<chrono::DateTime<chrono::Utc>> {
        let body = self.get("/timestamp", &[]).await?;

        #[derive(Deserialize)]
        struct ServerTimeResponse {
            #[serde(rename = "serverTime")]
            server_time: i64,
        }

        if let Ok(resp) = serde_json::from_slice::<ServerTimeResponse>(&body) {
            return Ok(chrono::DateTime::from_timestamp_millis(resp.server_time)
                .unwrap_or_default());
        }

        let timestamp: i64 = serde_json::from_slice(&body)?;
        Ok(chrono::DateTime::from_timestamp_millis(timestamp).unwrap_or_default())
    }

    /// Returns the request count in the current window.
    pub fn request_count(&self) -> i64 {
        self.request_count.load(Ordering::SeqCst)
    }
}
