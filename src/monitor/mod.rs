//! Live arbitrage monitor.
//!
//! Polls the triangle at a fixed interval, evaluates every snapshot and
//! keeps running statistics. Signals are logged and optionally persisted;
//! no orders are ever placed.

mod error;
mod stats;

pub use error::MonitorError;
pub use stats::Stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::arbitrage::{self, DEFAULT_THRESHOLD};
use crate::config::Config;
use crate::domain::ArbitrageSignal;
use crate::reader::SnapshotReader;
use crate::storage::SqliteStorage;

/// Default interval between snapshot reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Monitor configuration options.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub threshold: f64,
    /// Application version, logged on start.
    pub version: String,
}

impl MonitorConfig {
    pub fn from_config(config: &Config, version: impl Into<String>) -> Self {
        let arbitrage = config.arbitrage.as_ref();

        Self {
            poll_interval: arbitrage
                .map(|a| a.poll_interval)
                .filter(|d| !d.is_zero())
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            threshold: arbitrage
                .and_then(|a| a.threshold)
                .unwrap_or(DEFAULT_THRESHOLD),
            version: version.into(),
        }
    }
}

/// Monitor runs the live detection loop.
pub struct Monitor {
    reader: SnapshotReader,
    storage: Option<Arc<SqliteStorage>>,
    cfg: MonitorConfig,

    // Runtime state
    started_at: Mutex<Option<Instant>>,
    running: Mutex<bool>,
    stats: Mutex<Stats>,
}

impl Monitor {
    /// Creates a new Monitor instance.
    pub fn new(
        reader: SnapshotReader,
        cfg: MonitorConfig,
        storage: Option<Arc<SqliteStorage>>,
    ) -> Result<Self, MonitorError> {
        if cfg.poll_interval.is_zero() {
            return Err(MonitorError::Config("poll_interval must be positive".into()));
        }
        if cfg.threshold.is_nan() || cfg.threshold < 0.0 {
            return Err(MonitorError::Config(format!(
                "threshold {} must be non-negative",
                cfg.threshold
            )));
        }

        Ok(Self {
            reader,
            storage,
            cfg,
            started_at: Mutex::new(None),
            running: Mutex::new(false),
            stats: Mutex::new(Stats::default()),
        })
    }

    /// Starts the monitor and polls until `stop` is called.
    pub async fn start(&self) -> Result<(), MonitorError> {
        {
            let mut running = self.running.lock().await;
            if *running {
                return Err(MonitorError::AlreadyRunning);
            }
            *running = true;
        }

        {
            let mut started_at = self.started_at.lock().await;
            *started_at = Some(Instant::now());
        }

        info!(
            version = %self.cfg.version,
            pairs = ?self.reader.triangle().pairs(),
            threshold = self.cfg.threshold,
            poll_interval = ?self.cfg.poll_interval,
            storage = self.storage.is_some(),
            "Starting arbitrage monitor"
        );

        self.run_main_loop().await;
        Ok(())
    }

    /// Stops the loop before its next poll.
    pub async fn stop(&self) {
        {
            let mut running = self.running.lock().await;
            if !*running {
                return;
            }
            *running = false;
        }

        let stats = self.stats().await;
        info!(
            uptime = ?self.uptime().await,
            cycles = stats.detection_cycles,
            failed_reads = stats.failed_reads,
            opportunities = stats.opportunities_detected,
            best_factor = stats.best_factor,
            "Monitor stopped"
        );
    }

    /// Returns a copy of the current statistics.
    pub async fn stats(&self) -> Stats {
        self.stats.lock().await.clone()
    }

    /// Returns true if the monitor is currently running.
    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Returns how long the monitor has been running.
    pub async fn uptime(&self) -> Duration {
        self.started_at
            .lock()
            .await
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    async fn run_main_loop(&self) {
        let mut interval = tokio::time::interval(self.cfg.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.is_running().await {
                break;
            }
            self.poll_once().await;
        }
    }

    /// Runs one read-evaluate cycle. Failures are logged and counted.
    pub async fn poll_once(&self) -> Option<ArbitrageSignal> {
        let cycles = {
            let mut stats = self.stats.lock().await;
            stats.detection_cycles += 1;
            stats.detection_cycles
        };

        let snapshot = match self.reader.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(cycle = cycles, error = %e, "Snapshot read failed");
                self.stats.lock().await.failed_reads += 1;
                return None;
            }
        };

        let signal = match arbitrage::evaluate(&snapshot, self.cfg.threshold) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(cycle = cycles, error = %e, "Snapshot evaluation failed");
                self.stats.lock().await.evaluation_failures += 1;
                return None;
            }
        };

        self.stats.lock().await.record_signal(&signal);

        match signal.best_opportunity() {
            Some((direction, factor)) => info!(
                cycle = cycles,
                direction = %direction,
                factor = factor,
                cycle1 = signal.cycle1_factor,
                cycle2 = signal.cycle2_factor,
                "Arbitrage opportunity"
            ),
            None => debug!(
                cycle = cycles,
                cycle1 = signal.cycle1_factor,
                cycle2 = signal.cycle2_factor,
                "No opportunity"
            ),
        }

        if let Some(ref storage) = self.storage {
            match storage.save_signal(&signal, self.reader.triangle()).await {
                Ok(_) => self.stats.lock().await.signals_saved += 1,
                Err(e) => {
                    warn!(error = %e, "Failed to save signal");
                    self.stats.lock().await.storage_failures += 1;
                }
            }
        }

        Some(signal)
    }
}
