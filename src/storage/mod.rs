//! Persistence for aligned records, live signals and backtest runs.

mod jsonl;
mod sqlite;

pub use jsonl::{JsonLinesWriter, read_records};
pub use sqlite::{SqliteStorage, SqliteStorageConfig};

use crate::domain::AlignedRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

/// RecordSink receives aligned records one complete window at a time.
#[async_trait]
pub trait RecordSink: Send {
    /// Persists a window; records arrive ascending and never repeat.
    async fn write_window(&mut self, records: &[AlignedRecord]) -> Result<(), StorageError>;
}

#[async_trait]
impl RecordSink for Vec<AlignedRecord> {
    async fn write_window(&mut self, records: &[AlignedRecord]) -> Result<(), StorageError> {
        self.extend_from_slice(records);
        Ok(())
    }
}

/// Tee writes every window to two sinks, first `A` then `B`.
pub struct Tee<A, B>(pub A, pub B);

#[async_trait]
impl<A, B> RecordSink for Tee<A, B>
where
    A: RecordSink,
    B: RecordSink,
{
    async fn write_window(&mut self, records: &[AlignedRecord]) -> Result<(), StorageError> {
        self.0.write_window(records).await?;
        self.1.write_window(records).await
    }
}

/// Loads the records a backtest replays.
///
/// SQLite is read over `[start, end)` when it holds any records; otherwise
/// the JSON-lines file is read whole.
pub async fn load_backtest_records(
    db: Option<&SqliteStorage>,
    records_file: impl AsRef<Path>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<AlignedRecord>, StorageError> {
    if let Some(db) = db {
        let stored = db.count_records().await?;
        if stored > 0 {
            let records = db.load_records(start, end).await?;
            info!(
                stored = stored,
                records = records.len(),
                start = %start,
                end = %end,
                "Records loaded from SQLite"
            );
            return Ok(records);
        }
    }

    let path = records_file.as_ref();
    let records = read_records(path).await?;
    info!(records = records.len(), records_file = %path.display(), "Records loaded");
    Ok(records)
}

/// StorageError represents errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
