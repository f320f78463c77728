//! SQLite storage for aligned records, live signals and backtest runs.

use crate::domain::{AlignedRecord, ArbitrageSignal, BacktestResult, Triangle};
use crate::storage::{RecordSink, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

/// SqliteStorage persists pipeline output in a single SQLite database.
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

/// SqliteStorageConfig holds SQLite storage configuration.
#[derive(Debug, Clone)]
pub struct SqliteStorageConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            path: "triangle_arb.db".to_string(),
            max_connections: 5,
        }
    }
}

impl SqliteStorage {
    /// Opens (creating if missing) the database file in WAL mode.
    pub async fn new(config: SqliteStorageConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;

        info!(path = %config.path, "SQLite storage initialized");
        Ok(storage)
    }

    /// Opens a private in-memory database.
    ///
    /// The pool holds exactly one connection that never expires, since every
    /// new connection to `:memory:` would see an empty database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Runs database migrations to create the schema.
    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS aligned_records (
                ts_ms INTEGER PRIMARY KEY,
                price_ac REAL NOT NULL,
                price_bc REAL NOT NULL,
                price_ba REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                detected_at TEXT NOT NULL,
                pair_ac TEXT NOT NULL,
                pair_bc TEXT NOT NULL,
                pair_ba TEXT NOT NULL,
                price_ac REAL NOT NULL,
                price_bc REAL NOT NULL,
                price_ba REAL NOT NULL,
                cycle1_factor REAL NOT NULL,
                cycle1_is_opportunity INTEGER NOT NULL,
                cycle2_factor REAL NOT NULL,
                cycle2_is_opportunity INTEGER NOT NULL,
                threshold REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_detected_at ON signals(detected_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                trade_fraction REAL NOT NULL,
                threshold REAL NOT NULL,
                initial_capital REAL NOT NULL,
                final_value REAL NOT NULL,
                trades INTEGER NOT NULL,
                cumulative_return REAL NOT NULL,
                average_return REAL NOT NULL,
                std_return REAL NOT NULL,
                sharpe_ratio REAL NOT NULL,
                max_drawdown REAL NOT NULL,
                portfolio_history TEXT NOT NULL,
                trade_returns TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts records, ignoring timestamps already stored.
    /// Returns the number of new rows.
    pub async fn save_records(&self, records: &[AlignedRecord]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in records {
            let snapshot = record.snapshot();
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO aligned_records (ts_ms, price_ac, price_bc, price_ba)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(record.key())
            .bind(snapshot.price_ac)
            .bind(snapshot.price_bc)
            .bind(snapshot.price_ba)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            records = records.len(),
            inserted = inserted,
            "Aligned records saved"
        );
        Ok(inserted)
    }

    /// Loads records with `start <= timestamp < end`, ascending.
    pub async fn load_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AlignedRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT ts_ms, price_ac, price_bc, price_ba
            FROM aligned_records
            WHERE ts_ms >= ?1 AND ts_ms < ?2
            ORDER BY ts_ms ASC
            "#,
        )
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_record_row).collect()
    }

    pub async fn count_records(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM aligned_records")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    /// Stores a live signal together with the pairs it was read from.
    pub async fn save_signal(
        &self,
        signal: &ArbitrageSignal,
        triangle: &Triangle,
    ) -> Result<i64, StorageError> {
        let [ac, bc, ba] = triangle.pairs();

        let result = sqlx::query(
            r#"
            INSERT INTO signals (
                detected_at, pair_ac, pair_bc, pair_ba, price_ac, price_bc, price_ba,
                cycle1_factor, cycle1_is_opportunity, cycle2_factor, cycle2_is_opportunity,
                threshold
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(signal.timestamp.to_rfc3339())
        .bind(ac)
        .bind(bc)
        .bind(ba)
        .bind(signal.price_ac)
        .bind(signal.price_bc)
        .bind(signal.price_ba)
        .bind(signal.cycle1_factor)
        .bind(signal.cycle1_is_opportunity)
        .bind(signal.cycle2_factor)
        .bind(signal.cycle2_is_opportunity)
        .bind(signal.threshold)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id = id, opportunity = signal.has_opportunity(), "Signal saved");
        Ok(id)
    }

    pub async fn count_signals(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM signals")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    /// Stores a backtest summary with its parameters; returns the run id.
    pub async fn save_backtest_run(
        &self,
        result: &BacktestResult,
        trade_fraction: f64,
        threshold: f64,
    ) -> Result<i64, StorageError> {
        let history = serde_json::to_string(&result.portfolio_history)?;
        let returns = serde_json::to_string(&result.trade_returns)?;

        let row = sqlx::query(
            r#"
            INSERT INTO backtest_runs (
                created_at, trade_fraction, threshold, initial_capital, final_value,
                trades, cumulative_return, average_return, std_return, sharpe_ratio,
                max_drawdown, portfolio_history, trade_returns
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(trade_fraction)
        .bind(threshold)
        .bind(result.initial_capital)
        .bind(result.final_value)
        .bind(result.trades as i64)
        .bind(result.cumulative_return)
        .bind(result.average_return)
        .bind(result.std_return)
        .bind(result.sharpe_ratio)
        .bind(result.max_drawdown)
        .bind(history)
        .bind(returns)
        .execute(&self.pool)
        .await?;

        let id = row.last_insert_rowid();
        info!(
            id = id,
            trades = result.trades,
            cumulative_return = result.cumulative_return,
            "Backtest run saved"
        );
        Ok(id)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordSink for SqliteStorage {
    async fn write_window(&mut self, records: &[AlignedRecord]) -> Result<(), StorageError> {
        self.save_records(records).await?;
        Ok(())
    }
}

fn parse_record_row(row: &SqliteRow) -> Result<AlignedRecord, StorageError> {
    let ts_ms: i64 = row.try_get("ts_ms")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .ok_or_else(|| StorageError::InvalidData(format!("Invalid ts_ms: {}", ts_ms)))?;

    Ok(AlignedRecord::new(
        timestamp,
        row.try_get("price_ac")?,
        row.try_get("price_bc")?,
        row.try_get("price_ba")?,
    ))
}
