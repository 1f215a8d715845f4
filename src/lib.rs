//! Market-data contract checks
//!
//! This library resolves a fixed plan of HTTP checks, runs it against the
//! market-data service and aggregates the results into a run summary.

pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;
pub mod http;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::{Harness, RunState, RunSummary, StepSpec};
pub use http::{HttpClient, Transport, TransportError};
