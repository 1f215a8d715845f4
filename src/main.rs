//! Market-data contract checks
//!
//! Runs an ordered sequence of HTTP checks against the ingestion and
//! analytics service and exits 0 only if every check passed.

use std::path::PathBuf;

use clap::Parser;
use market_smoke::common::{config::Config, logging};
use market_smoke::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "market-smoke", about = "Contract checks for the market-data service")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log requests and state changes to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    let result = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
