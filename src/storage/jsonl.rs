//! JSON-lines record files: one aligned record per line.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::{RecordSink, StorageError};
use crate::domain::AlignedRecord;

/// JsonLinesWriter appends aligned records to a file.
///
/// Each window is flushed as a unit so the file stays readable if the
/// process stops between windows.
pub struct JsonLinesWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl JsonLinesWriter {
    /// Creates (or truncates) the file at `path`.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = File::create(path).await?;
        info!(path = %path.display(), "record file created");

        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl RecordSink for JsonLinesWriter {
    async fn write_window(&mut self, records: &[AlignedRecord]) -> Result<(), StorageError> {
        for record in records {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            self.writer.write_all(&line).await?;
        }
        self.writer.flush().await?;

        self.written += records.len();
        debug!(records = records.len(), total = self.written, "window appended");
        Ok(())
    }
}

/// Reads every record from a JSON-lines file, in file order.
///
/// Blank lines are skipped; any other unparsable line is an error naming its
/// line number.
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<AlignedRecord>, StorageError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| StorageError::InvalidData(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}
