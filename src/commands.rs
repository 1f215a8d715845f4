//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI. Options left unset fall
//! back to the configuration file, then to built-in defaults.

use chrono::NaiveDate;
use clap::{Args, Subcommand};

/// Intervals the service accepts for ingestion
pub const INTERVALS: [&str; 3] = ["1d", "1wk", "1mo"];

#[derive(Subcommand)]
pub enum Commands {
    /// Run every check: health, ingestion, reads, metrics and signals
    Run {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// Annual risk-free rate for the metric steps (decimal)
        #[arg(long)]
        rf: Option<f64>,

        /// Minimum acceptable return for the advanced metrics (decimal)
        #[arg(long)]
        mar: Option<f64>,

        /// Momentum lookback window
        #[arg(long)]
        window: Option<u32>,

        /// Fast SMA window
        #[arg(long)]
        fast: Option<u32>,

        /// Slow SMA window
        #[arg(long)]
        slow: Option<u32>,

        /// RSI period
        #[arg(long)]
        rsi_period: Option<u32>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check health, the last stored bar, and incremental ingestion only
    Latest {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the requests of the full run without sending them
    Plan {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        range: RangeArgs,
    },
}

/// Service and instrument selection
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Base address of the service (default: http://127.0.0.1:8000)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Ticker symbol to check (default: VOO)
    #[arg(long, short)]
    pub symbol: Option<String>,

    /// Bar interval for ingestion (default: 1d)
    #[arg(long, value_parser = INTERVALS)]
    pub interval: Option<String>,
}

/// Date range for ingestion, reads, metrics and signals
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First date, YYYY-MM-DD (default: 2025-01-01)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date, YYYY-MM-DD (default: 2025-09-10)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

/// Transport and report options
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Per-request timeout in seconds, at least 1 (default: 10)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print a JSON report instead of one line per step
    #[arg(long)]
    pub json: bool,
}
