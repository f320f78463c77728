mod arbitrage;
mod backtest;
mod config;
mod domain;
mod exchanges;
mod history;
mod monitor;
mod reader;
mod storage;

use std::env;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt};

use backtest::{BacktestError, BacktestParams};
use config::{Config, ConfigError};
use exchanges::{ExchangeError, PoloniexExchange};
use history::{HistoricalSeriesBuilder, HistoryError, HistoryRequest};
use monitor::{Monitor, MonitorConfig, MonitorError};
use reader::{ReaderError, SnapshotReader};
use storage::{
    JsonLinesWriter, RecordSink, SqliteStorage, SqliteStorageConfig, StorageError, Tee,
};

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";
const DEFAULT_RECORDS_FILE: &str = "data/records.jsonl";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level error for a run of the binary.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("usage: {0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Evaluation(#[from] arbitrage::EvaluationError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
    #[error("signal handler error: {0}")]
    Signal(#[from] std::io::Error),
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Monitor,
    Snapshot,
    FetchHistory,
    Backtest,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Monitor => write!(f, "monitor"),
            Mode::Snapshot => write!(f, "snapshot"),
            Mode::FetchHistory => write!(f, "fetch-history"),
            Mode::Backtest => write!(f, "backtest"),
        }
    }
}

fn parse_mode() -> Result<Mode, AppError> {
    let Some(arg) = env::args().skip(1).find(|a| !a.starts_with("--")) else {
        return Ok(Mode::Monitor);
    };

    match arg.as_str() {
        "monitor" => Ok(Mode::Monitor),
        "snapshot" => Ok(Mode::Snapshot),
        "fetch-history" => Ok(Mode::FetchHistory),
        "backtest" => Ok(Mode::Backtest),
        other => Err(AppError::Usage(format!(
            "unknown mode {:?}; expected monitor, snapshot, fetch-history or backtest",
            other
        ))),
    }
}

fn parse_config_path() -> String {
    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_tracing(log_level: Option<&str>) {
    let level = match log_level {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") => Level::ERROR,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    subscriber_fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let mode = match parse_mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let config_path = parse_config_path();
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.app.log_level.as_deref());

    info!(
        config = %config_path,
        mode = %mode,
        app = %config.app.name,
        env = %config.app.env,
        "Configuration loaded"
    );

    let result = match mode {
        Mode::Monitor => run_monitor(&config).await,
        Mode::Snapshot => run_snapshot(&config).await,
        Mode::FetchHistory => run_fetch_history(&config).await,
        Mode::Backtest => run_backtest(&config).await,
    };

    if let Err(e) = result {
        error!(mode = %mode, error = %e, "Run failed");
        std::process::exit(1);
    }
}

/// Opens SQLite storage when the storage section enables it.
async fn open_storage(config: &Config) -> Result<Option<SqliteStorage>, StorageError> {
    let Some(ref storage) = config.storage else {
        return Ok(None);
    };
    if !storage.enabled {
        return Ok(None);
    }

    let mut sqlite_config = SqliteStorageConfig::default();
    if let Some(ref path) = storage.path {
        sqlite_config.path = path.clone();
    }

    SqliteStorage::new(sqlite_config).await.map(Some)
}

fn records_file(config: &Config) -> String {
    config
        .storage
        .as_ref()
        .and_then(|s| s.records_file.clone())
        .unwrap_or_else(|| DEFAULT_RECORDS_FILE.to_string())
}

async fn connect_market(config: &Config) -> Result<Arc<PoloniexExchange>, AppError> {
    let exchange = PoloniexExchange::from_config(config)?;
    if let Err(e) = exchange.check_connectivity().await {
        warn!(error = %e, "Connectivity check failed, continuing");
    }
    Ok(Arc::new(exchange))
}

async fn run_monitor(config: &Config) -> Result<(), AppError> {
    let market = connect_market(config).await?;
    let reader = SnapshotReader::new(market, config.triangle()?);
    let storage = open_storage(config).await?.map(Arc::new);

    let monitor = Arc::new(Monitor::new(
        reader,
        MonitorConfig::from_config(config, VERSION),
        storage.clone(),
    )?);

    let handle = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.start().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    monitor.stop().await;
    handle.await??;

    if let Some(storage) = storage {
        storage.close().await;
    }
    Ok(())
}

async fn run_snapshot(config: &Config) -> Result<(), AppError> {
    let market = connect_market(config).await?;
    let triangle = config.triangle()?;
    let reader = SnapshotReader::new(market, triangle.clone());

    let threshold = config
        .arbitrage
        .as_ref()
        .and_then(|a| a.threshold)
        .unwrap_or(arbitrage::DEFAULT_THRESHOLD);

    let quotes = reader.read_quotes().await?;
    let snapshot = reader.to_snapshot(&quotes)?;
    let signal = arbitrage::evaluate(&snapshot, threshold)?;

    let report = serde_json::json!({
        "triangle": triangle,
        "quotes": quotes,
        "signal": signal,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_fetch_history(config: &Config) -> Result<(), AppError> {
    let history = config
        .history
        .as_ref()
        .ok_or_else(|| HistoryError::InvalidRequest("history section is required".into()))?;
    let request = HistoryRequest::from_config(history, Utc::now())?;

    let market = connect_market(config).await?;
    let builder = HistoricalSeriesBuilder::new(market, config.triangle()?);

    let path = records_file(config);
    let writer = JsonLinesWriter::create(&path).await?;
    let mut sink: Box<dyn RecordSink> = match open_storage(config).await? {
        Some(db) => Box::new(Tee(writer, db)),
        None => Box::new(writer),
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, stopping after current window");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    info!(
        start = %request.start,
        end = %request.end,
        timeframe = ?request.timeframe,
        window = ?request.window,
        page_limit = request.page_limit,
        records_file = %path,
        "Fetching history"
    );

    let summary = builder.build_into(request, sink.as_mut(), &running).await?;

    info!(
        windows = summary.windows,
        records = summary.records,
        degraded_windows = summary.degraded_windows,
        aborted = summary.aborted,
        records_file = %path,
        "History fetch finished"
    );
    Ok(())
}

async fn run_backtest(config: &Config) -> Result<(), AppError> {
    let db = open_storage(config).await?;

    // an unset history range replays everything stored
    let history = config.history.as_ref();
    let start = history
        .and_then(|h| h.start)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = history.and_then(|h| h.end).unwrap_or(DateTime::<Utc>::MAX_UTC);

    let records =
        storage::load_backtest_records(db.as_ref(), records_file(config), start, end).await?;

    let params = BacktestParams::from_config(config);
    let result = backtest::run(&records, params.clone())?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(db) = db {
        db.save_backtest_run(&result, params.trade_fraction, params.threshold)
            .await?;
        db.close().await;
    }
    Ok(())
}
