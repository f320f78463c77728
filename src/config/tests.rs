//! Tests for config module.

use super::*;
use chrono::{TimeZone, Utc};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

// ==================== Duration parsing tests ====================

#[test]
fn test_parse_duration_seconds() {
    let d = duration::parse_duration("30s").unwrap();
    assert_eq!(d, Duration::from_secs(30));
}

#[test]
fn test_parse_duration_minutes() {
    let d = duration::parse_duration("100m").unwrap();
    assert_eq!(d, Duration::from_secs(6000));
}

#[test]
fn test_parse_duration_days_and_weeks() {
    assert_eq!(
        duration::parse_duration("1d").unwrap(),
        Duration::from_secs(86_400)
    );
    assert_eq!(
        duration::parse_duration("1w").unwrap(),
        Duration::from_secs(604_800)
    );
}

#[test]
fn test_parse_duration_milliseconds() {
    let d = duration::parse_duration("250ms").unwrap();
    assert_eq!(d, Duration::from_millis(250));
}

#[test]
fn test_parse_duration_bare_number_is_seconds() {
    let d = duration::parse_duration("5").unwrap();
    assert_eq!(d, Duration::from_secs(5));
}

#[test]
fn test_parse_duration_empty() {
    let d = duration::parse_duration("").unwrap();
    assert_eq!(d, Duration::ZERO);
}

#[test]
fn test_parse_duration_invalid_unit() {
    let result = duration::parse_duration("10y");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("unknown duration unit"));
}

#[test]
fn test_parse_duration_overflow_is_error() {
    let result = duration::parse_duration("99999999999999999999999w");
    assert!(result.unwrap_err().contains("out of range"));
}

#[test]
fn test_overflowing_duration_in_yaml_is_rejected() {
    let yaml = format!(
        "{}\nhistory:\n  window: 99999999999999999999999w\n",
        minimal_valid_yaml()
    );
    assert!(from_yaml(&yaml).is_err());
}

// ==================== YAML field loading tests ====================

/// Parse config from YAML string (for testing).
fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    Ok(config)
}

fn minimal_valid_yaml() -> String {
    r#"
app:
  name: triangle
  env: development

exchanges:
  poloniex:
    enabled: true

triangle:
  ac: BTC/USDT
  bc: ETH/USDT
  ba: ETH/BTC
"#
    .to_string()
}

#[test]
fn test_load_app_fields() {
    let yaml = r#"
app:
  name: triangle
  env: production
  log_level: debug

exchanges:
  poloniex:
    enabled: true

triangle:
  ac: BTC/USDT
  bc: ETH/USDT
  ba: ETH/BTC
"#;
    let cfg = from_yaml(yaml).unwrap();

    assert_eq!(cfg.app.name, "triangle");
    assert_eq!(cfg.app.env, "production");
    assert_eq!(cfg.app.log_level, Some("debug".to_string()));
}

#[test]
fn test_load_exchange_fields() {
    let yaml = r#"
app:
  name: test
  env: dev

exchanges:
  poloniex:
    enabled: true
    base_url: https://mirror.example.com
    rate_limit: 50
    rate_window: 1s
    request_timeout: 5s

triangle:
  ac: BTC/USDT
  bc: ETH/USDT
  ba: ETH/BTC
"#;
    let cfg = from_yaml(yaml).unwrap();

    let ex = cfg.exchanges.get("poloniex").unwrap();
    assert!(ex.enabled);
    assert_eq!(ex.base_url.as_deref(), Some("https://mirror.example.com"));
    assert_eq!(ex.rate_limit, Some(50));
    assert_eq!(ex.rate_window, Duration::from_secs(1));
    assert_eq!(ex.request_timeout, Duration::from_secs(5));
}

#[test]
fn test_load_arbitrage_fields() {
    let yaml = format!(
        "{}\narbitrage:\n  threshold: 0.005\n  poll_interval: 2s\n",
        minimal_valid_yaml()
    );
    let cfg = from_yaml(&yaml).unwrap();

    let arb = cfg.arbitrage.unwrap();
    assert_eq!(arb.threshold, Some(0.005));
    assert_eq!(arb.poll_interval, Duration::from_secs(2));
}

#[test]
fn test_load_history_fields() {
    let yaml = format!(
        r#"{}
history:
  start: 2025-01-01T00:00:00Z
  end: 2025-01-02T00:00:00Z
  timeframe: 5m
  page_limit: 500
  window: 1d
"#,
        minimal_valid_yaml()
    );
    let cfg = from_yaml(&yaml).unwrap();

    let history = cfg.history.unwrap();
    assert_eq!(
        history.start,
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        history.end,
        Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap())
    );
    assert_eq!(history.timeframe, Duration::from_secs(300));
    assert_eq!(history.page_limit, Some(500));
    assert_eq!(history.window, Duration::from_secs(86_400));
}

#[test]
fn test_load_history_defaults_to_zero_durations() {
    let yaml = format!("{}\nhistory:\n  page_limit: 10\n", minimal_valid_yaml());
    let cfg = from_yaml(&yaml).unwrap();

    let history = cfg.history.unwrap();
    assert_eq!(history.start, None);
    assert_eq!(history.timeframe, Duration::ZERO);
    assert_eq!(history.window, Duration::ZERO);
}

#[test]
fn test_load_backtest_fields() {
    let yaml = format!(
        "{}\nbacktest:\n  trade_fraction: 0.25\n  initial_capital: 5000\n  steps_per_year: 8760\n",
        minimal_valid_yaml()
    );
    let cfg = from_yaml(&yaml).unwrap();

    let bt = cfg.backtest.unwrap();
    assert_eq!(bt.trade_fraction, Some(0.25));
    assert_eq!(bt.initial_capital, Some(5000.0));
    assert_eq!(bt.steps_per_year, Some(8760));
}

#[test]
fn test_load_storage_fields() {
    let yaml = format!(
        "{}\nstorage:\n  enabled: true\n  path: data/triangle.db\n  records_file: data/history.jsonl\n",
        minimal_valid_yaml()
    );
    let cfg = from_yaml(&yaml).unwrap();

    let storage = cfg.storage.unwrap();
    assert!(storage.enabled);
    assert_eq!(storage.path.as_deref(), Some("data/triangle.db"));
    assert_eq!(storage.records_file.as_deref(), Some("data/history.jsonl"));
}

#[test]
fn test_missing_triangle_section_fails_to_parse() {
    let yaml = r#"
app:
  name: test
  env: dev

exchanges:
  poloniex:
    enabled: true
"#;
    assert!(matches!(from_yaml(yaml), Err(ConfigError::Parse(_))));
}

// ==================== Validation tests ====================

fn validation_error(yaml: &str) -> String {
    let cfg = from_yaml(yaml).unwrap();
    cfg.validate().unwrap_err().to_string()
}

#[test]
fn test_validate_minimal_config() {
    let cfg = from_yaml(&minimal_valid_yaml()).unwrap();
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_validate_empty_app_name() {
    let yaml = minimal_valid_yaml().replace("name: triangle", "name: \"\"");
    assert!(validation_error(&yaml).contains("app.name is required"));
}

#[test]
fn test_validate_no_enabled_exchanges() {
    let yaml = minimal_valid_yaml().replace("enabled: true", "enabled: false");
    assert!(validation_error(&yaml).contains("at least one exchange must be enabled"));
}

#[test]
fn test_validate_broken_triangle() {
    let yaml = minimal_valid_yaml().replace("ba: ETH/BTC", "ba: BTC/ETH");
    assert!(validation_error(&yaml).contains("triangle"));
}

#[test]
fn test_validate_negative_threshold() {
    let yaml = format!("{}\narbitrage:\n  threshold: -0.01\n", minimal_valid_yaml());
    assert!(validation_error(&yaml).contains("threshold must be non-negative"));
}

#[test]
fn test_validate_zero_page_limit() {
    let yaml = format!("{}\nhistory:\n  page_limit: 0\n", minimal_valid_yaml());
    assert!(validation_error(&yaml).contains("page_limit must be positive"));
}

#[test]
fn test_validate_page_limit_above_endpoint_cap() {
    let yaml = format!("{}\nhistory:\n  page_limit: 501\n", minimal_valid_yaml());
    assert!(validation_error(&yaml).contains("page_limit must be at most 500"));
}

#[test]
fn test_validate_inverted_history_range() {
    let yaml = format!(
        "{}\nhistory:\n  start: 2025-02-01T00:00:00Z\n  end: 2025-01-01T00:00:00Z\n",
        minimal_valid_yaml()
    );
    assert!(validation_error(&yaml).contains("history.start must be before history.end"));
}

#[test]
fn test_validate_trade_fraction_out_of_range() {
    for fraction in ["0", "1.5", "-0.1"] {
        let yaml = format!(
            "{}\nbacktest:\n  trade_fraction: {}\n",
            minimal_valid_yaml(),
            fraction
        );
        assert!(
            validation_error(&yaml).contains("trade_fraction must be in (0, 1]"),
            "fraction {} accepted",
            fraction
        );
    }
}

#[test]
fn test_validate_full_trade_fraction_allowed() {
    let yaml = format!("{}\nbacktest:\n  trade_fraction: 1.0\n", minimal_valid_yaml());
    let cfg = from_yaml(&yaml).unwrap();
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_validate_zero_steps_per_year() {
    let yaml = format!("{}\nbacktest:\n  steps_per_year: 0\n", minimal_valid_yaml());
    assert!(validation_error(&yaml).contains("steps_per_year must be positive"));
}

// ==================== File loading tests ====================

#[test]
fn test_load_from_file() {
    let yaml = minimal_valid_yaml();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let cfg = Config::load(file.path().to_str().unwrap()).unwrap();

    assert_eq!(cfg.app.name, "triangle");
    assert_eq!(cfg.triangle.ac, "BTC/USDT");
    assert_eq!(cfg.triangle().unwrap().pairs()[2], "ETH/BTC");
}

#[test]
fn test_load_base_url_from_env() {
    // Unique exchange name to avoid env var conflicts with parallel tests
    let yaml = minimal_valid_yaml().replace("poloniex:", "mirrorex:");

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    unsafe {
        env::set_var("MIRROREX_BASE_URL", "http://127.0.0.1:9999");
    }

    let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
    let ex = cfg.exchanges.get("mirrorex").unwrap();
    assert_eq!(ex.base_url.as_deref(), Some("http://127.0.0.1:9999"));

    unsafe {
        env::remove_var("MIRROREX_BASE_URL");
    }
}

#[test]
fn test_load_file_not_found() {
    let result = Config::load("nonexistent_config.yaml");
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("failed to read config file"));
}

#[test]
fn test_shipped_config_is_valid() {
    let cfg = Config::load("configs/config.yaml").unwrap();

    assert!(cfg.exchanges["poloniex"].enabled);
    let history = cfg.history.as_ref().unwrap();
    assert_eq!(history.timeframe, Duration::from_secs(60));
    assert_eq!(history.window, Duration::from_secs(6_000));
    assert!(history.start < history.end);
    assert_eq!(cfg.backtest.as_ref().unwrap().steps_per_year, Some(525_600));
}
