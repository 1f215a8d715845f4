//! Configuration file handling
//!
//! Every field is optional; command-line flags override what is loaded here.
//! Dates are quoted strings (`start = "2025-01-01"`).

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Which service and instrument to check
    #[serde(default)]
    pub target: TargetConfig,

    /// Query parameters for the range, metric and signal steps
    #[serde(default)]
    pub params: ParamsConfig,

    /// Transport settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Service and instrument under test
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Bar interval passed to ingestion (`1d`, `1wk` or `1mo`)
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            symbol: default_symbol(),
            interval: default_interval(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_symbol() -> String {
    "VOO".to_string()
}
fn default_interval() -> String {
    "1d".to_string()
}

/// Step parameters
#[derive(Debug, Deserialize)]
pub struct ParamsConfig {
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    #[serde(default = "default_end")]
    pub end: NaiveDate,

    /// Annual risk-free rate (decimal)
    #[serde(default = "default_rf")]
    pub rf: f64,

    /// Minimum acceptable return (decimal)
    #[serde(default)]
    pub mar: f64,

    /// Momentum lookback
    #[serde(default = "default_window")]
    pub window: u32,

    #[serde(default = "default_fast")]
    pub fast: u32,

    #[serde(default = "default_slow")]
    pub slow: u32,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: u32,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            rf: default_rf(),
            mar: 0.0,
            window: default_window(),
            fast: default_fast(),
            slow: default_slow(),
            rsi_period: default_rsi_period(),
        }
    }
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}
fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 10).unwrap_or_default()
}
fn default_rf() -> f64 {
    0.02
}
fn default_window() -> u32 {
    60
}
fn default_fast() -> u32 {
    20
}
fn default_slow() -> u32 {
    50
}
fn default_rsi_period() -> u32 {
    14
}

/// Transport settings
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    concat!("market-smoke/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Load configuration from an explicit path, or the default config file
    ///
    /// An explicit path must exist. The default file is optional and
    /// defaults are returned when it is absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used
    fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(super::Error::Config(
                "http.timeout_secs must be at least 1".to_string(),
            ));
        }
        for (name, value) in [("params.rf", self.params.rf), ("params.mar", self.params.mar)] {
            if !value.is_finite() {
                return Err(super::Error::Config(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
