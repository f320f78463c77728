//! Monitor error types.

/// Monitor error type.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor is already running")]
    AlreadyRunning,
    #[error("config error: {0}")]
    Config(String),
}
