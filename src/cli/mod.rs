//! CLI command handling
//!
//! Merges flags with the configuration file, resolves the plan and runs it.

use chrono::NaiveDate;

use crate::commands::{Commands, OutputArgs, RangeArgs, TargetArgs, INTERVALS};
use crate::common::config::{Config, HttpConfig};
use crate::common::{Error, Result};
use crate::harness::{self, report, Harness, PlanParams};
use crate::http::{request, HttpClient};

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands, config: Config) -> Result<i32> {
    match command {
        Commands::Run {
            target,
            range,
            rf,
            mar,
            window,
            fast,
            slow,
            rsi_period,
            output,
        } => {
            let (base_url, mut params) = resolve_params(&target, &range, &config)?;
            params.rf = rf.unwrap_or(params.rf);
            params.mar = mar.unwrap_or(params.mar);
            params.window = window.unwrap_or(params.window);
            params.fast = fast.unwrap_or(params.fast);
            params.slow = slow.unwrap_or(params.slow);
            params.rsi_period = rsi_period.unwrap_or(params.rsi_period);
            check_rates(&params)?;

            let base = request::parse_base_url(&base_url)?;
            let harness = Harness::new(harness::full_plan(&params), &base)?;
            execute(harness, &base_url, &output, config.http).await
        }

        Commands::Latest { target, output } => {
            let (base_url, symbol, interval) = resolve_target(&target, &config)?;

            let base = request::parse_base_url(&base_url)?;
            let harness = Harness::new(harness::latest_plan(&symbol, &interval), &base)?;
            execute(harness, &base_url, &output, config.http).await
        }

        Commands::Plan { target, range } => {
            let (base_url, params) = resolve_params(&target, &range, &config)?;
            check_rates(&params)?;

            let base = request::parse_base_url(&base_url)?;
            let harness = Harness::new(harness::full_plan(&params), &base)?;
            for (i, (spec, request)) in harness.steps().enumerate() {
                println!("{:>2}. {:<18} {} {}", i + 1, spec.name, request.method, request.url);
            }
            Ok(0)
        }
    }
}

async fn execute(
    harness: Harness,
    base_url: &str,
    output: &OutputArgs,
    mut http: HttpConfig,
) -> Result<i32> {
    if let Some(timeout) = output.timeout {
        http.timeout_secs = timeout;
    }
    let client = HttpClient::new(&http)?;

    tracing::info!(
        base_url,
        steps = harness.len(),
        timeout_secs = http.timeout_secs,
        "Starting run"
    );

    if !output.json {
        println!("Checking {} ({} steps)\n", base_url, harness.len());
    }

    let summary = harness
        .run(&client, |result| {
            if !output.json {
                report::print_step(result);
            }
        })
        .await;

    if output.json {
        report::print_json(&summary)?;
    } else {
        report::print_summary(&summary);
    }

    Ok(summary.exit_code())
}

/// Base URL, upper-cased symbol and interval
fn resolve_target(args: &TargetArgs, config: &Config) -> Result<(String, String, String)> {
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| config.target.base_url.clone());

    let symbol = args
        .symbol
        .clone()
        .unwrap_or_else(|| config.target.symbol.clone())
        .trim()
        .to_uppercase();
    if symbol.is_empty() {
        return Err(Error::Config("symbol must not be empty".to_string()));
    }
    if symbol == "." || symbol == ".." {
        return Err(Error::Config(format!("'{}' is not a valid symbol", symbol)));
    }

    let interval = args
        .interval
        .clone()
        .unwrap_or_else(|| config.target.interval.clone());
    if !INTERVALS.contains(&interval.as_str()) {
        return Err(Error::Config(format!(
            "unsupported interval '{}', expected one of: {}",
            interval,
            INTERVALS.join(", ")
        )));
    }

    Ok((base_url, symbol, interval))
}

/// Base URL and full-plan parameters, before per-flag overrides
fn resolve_params(
    target: &TargetArgs,
    range: &RangeArgs,
    config: &Config,
) -> Result<(String, PlanParams)> {
    let (base_url, symbol, interval) = resolve_target(target, config)?;
    let (start, end) = resolve_range(range, config)?;
    let params = PlanParams {
        symbol,
        start,
        end,
        interval,
        rf: config.params.rf,
        mar: config.params.mar,
        window: config.params.window,
        fast: config.params.fast,
        slow: config.params.slow,
        rsi_period: config.params.rsi_period,
    };
    Ok((base_url, params))
}

/// `rf` and `mar` must be finite to go in a query string
fn check_rates(params: &PlanParams) -> Result<()> {
    for (name, value) in [("rf", params.rf), ("mar", params.mar)] {
        if !value.is_finite() {
            return Err(Error::Config(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

fn resolve_range(args: &RangeArgs, config: &Config) -> Result<(NaiveDate, NaiveDate)> {
    let start = args.start.unwrap_or(config.params.start);
    let end = args.end.unwrap_or(config.params.end);
    if start > end {
        return Err(Error::Config(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults_and_uppercase() {
        let config = Config::default();
        let args = TargetArgs {
            symbol: Some(" spy ".to_string()),
            ..Default::default()
        };
        let (base_url, symbol, interval) = resolve_target(&args, &config).unwrap();
        assert_eq!(base_url, "http://127.0.0.1:8000");
        assert_eq!(symbol, "SPY");
        assert_eq!(interval, "1d");
    }

    #[test]
    fn test_config_interval_is_checked() {
        let mut config = Config::default();
        config.target.interval = "5m".to_string();
        let err = resolve_target(&TargetArgs::default(), &config).unwrap_err();
        assert!(err.to_string().contains("5m"));
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let args = TargetArgs {
            symbol: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(resolve_target(&args, &Config::default()).is_err());
    }

    #[test]
    fn test_dot_symbols_rejected() {
        for symbol in [".", ".."] {
            let args = TargetArgs {
                symbol: Some(symbol.to_string()),
                ..Default::default()
            };
            let err = resolve_target(&args, &Config::default()).unwrap_err();
            assert!(err.to_string().contains("not a valid symbol"));
        }
    }

    #[test]
    fn test_non_finite_rates_rejected() {
        let (_, mut params) =
            resolve_params(&TargetArgs::default(), &RangeArgs::default(), &Config::default())
                .unwrap();
        assert!(check_rates(&params).is_ok());

        params.rf = f64::NAN;
        assert!(check_rates(&params).unwrap_err().to_string().contains("rf"));

        params.rf = 0.02;
        params.mar = f64::INFINITY;
        assert!(check_rates(&params).unwrap_err().to_string().contains("mar"));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let args = RangeArgs {
            start: NaiveDate::from_ymd_opt(2025, 9, 10),
            end: NaiveDate::from_ymd_opt(2025, 1, 1),
        };
        assert!(resolve_range(&args, &Config::default()).is_err());
    }
}
