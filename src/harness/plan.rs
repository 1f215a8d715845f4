//! Static step definitions
//!
//! Ingestion runs before any read so that reads and metrics see the data
//! it stored.

use chrono::NaiveDate;

use super::spec::{Comparison, Predicate, StepSpec, ValidationRule};

/// Fields every ingestion response carries
const INGEST_FIELDS: &[&str] = &["ticker", "start", "end", "ingested", "upsert_effect"];

/// Parameters of the full plan
#[derive(Debug, Clone)]
pub struct PlanParams {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: String,
    pub rf: f64,
    pub mar: f64,
    pub window: u32,
    pub fast: u32,
    pub slow: u32,
    pub rsi_period: u32,
}

/// Every check, in dependency order
pub fn full_plan(p: &PlanParams) -> Vec<StepSpec> {
    vec![
        health(),
        StepSpec::get("ready", "/ready").rule(status_ok()).highlight(&["status"]),
        StepSpec::post("ingest", "/ingest/{symbol}")
            .path_param("symbol", &p.symbol)
            .query("start", p.start)
            .query("end", p.end)
            .query("interval", p.interval.as_str())
            .rule(
                ValidationRule::require(INGEST_FIELDS)
                    .with(Predicate::compare("ingested", Comparison::Ge, 1.0)),
            )
            .highlight(&["ingested", "upsert_effect"]),
        StepSpec::get("prices-range", "/prices/{symbol}/db/range")
            .path_param("symbol", &p.symbol)
            .query("start", p.start)
            .query("end", p.end)
            .rule(
                ValidationRule::require(&["ticker", "start", "end", "count", "data"])
                    .with(Predicate::compare("count", Comparison::Ge, 1.0))
                    .with(Predicate::length("data", Comparison::Ge, 1.0)),
            )
            .highlight(&["count"]),
        last_bar(&p.symbol),
        ingest_latest(&p.symbol, &p.interval),
        StepSpec::get("metrics-basic", "/metrics/{symbol}/basic")
            .path_param("symbol", &p.symbol)
            .query("start", p.start)
            .query("end", p.end)
            .query("rf", p.rf)
            .rule(ValidationRule::require(&[
                "ann_return",
                "ann_volatility",
                "sharpe",
                "max_drawdown",
            ]))
            .highlight(&["ann_return", "sharpe", "max_drawdown"]),
        StepSpec::get("metrics-advanced", "/metrics/{symbol}/advanced")
            .path_param("symbol", &p.symbol)
            .query("start", p.start)
            .query("end", p.end)
            .query("rf", p.rf)
            .query("mar", p.mar)
            .rule(ValidationRule::require(&["downside_volatility", "sortino", "calmar"]))
            .highlight(&["sortino", "calmar"]),
        StepSpec::get("signals-tech", "/signals/{symbol}/tech")
            .path_param("symbol", &p.symbol)
            .query("start", p.start)
            .query("end", p.end)
            .query("window", p.window)
            .query("fast", p.fast)
            .query("slow", p.slow)
            .query("rsi_period", p.rsi_period)
            .rule(ValidationRule::require(&["momentum", "sma_fast", "sma_slow", "rsi"]))
            .highlight(&["momentum", "rsi"]),
    ]
}

/// Health, last stored bar, then incremental ingest
pub fn latest_plan(symbol: &str, interval: &str) -> Vec<StepSpec> {
    vec![health(), last_bar(symbol), ingest_latest(symbol, interval)]
}

fn status_ok() -> ValidationRule {
    ValidationRule::require(&["status"]).with(Predicate::equals("status", "ok"))
}

fn health() -> StepSpec {
    StepSpec::get("health", "/health")
        .rule(status_ok())
        .highlight(&["status"])
}

fn last_bar(symbol: &str) -> StepSpec {
    StepSpec::get("prices-last", "/prices/{symbol}/db/last")
        .path_param("symbol", symbol)
        .rule(ValidationRule::require(&["ticker", "date", "close"]))
        .highlight(&["date", "close"])
}

fn ingest_latest(symbol: &str, interval: &str) -> StepSpec {
    StepSpec::post("ingest-latest", "/ingest/{symbol}/latest")
        .path_param("symbol", symbol)
        .query("interval", interval)
        .rule(
            ValidationRule::require(INGEST_FIELDS)
                .with(Predicate::compare("ingested", Comparison::Ge, 0.0)),
        )
        .highlight(&["ingested", "upsert_effect"])
}
