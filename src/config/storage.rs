//! Storage configuration.

use serde::Deserialize;

/// Record and signal persistence settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Whether SQLite storage is active.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the SQLite database file.
    pub path: Option<String>,
    /// JSON-lines file the aligned history is written to and read from.
    pub records_file: Option<String>,
}
