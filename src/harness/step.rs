//! Step execution
//!
//! Runs one resolved step: one transport call, then validation on success.
//! Transport failures become `Errored` results without validation. Nothing
//! here returns an error to the caller.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::spec::StepSpec;
use super::validator::{self, Failure};
use crate::http::{Request, Transport, TransportError};

/// Coarse status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Errored,
}

/// What happened when a step ran
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed,
    /// Well-formed response that did not conform
    Failed(Failure),
    /// The request itself failed
    Errored(TransportError),
}

impl Outcome {
    pub fn status(&self) -> StepStatus {
        match self {
            Outcome::Passed => StepStatus::Passed,
            Outcome::Failed(_) => StepStatus::Failed,
            Outcome::Errored(_) => StepStatus::Errored,
        }
    }

    /// Whether the run must stop after this outcome
    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Errored(e) if e.is_fatal())
    }
}

/// Result of executing one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub request: Request,
    pub outcome: Outcome,
    /// Human-readable detail line
    pub detail: String,
    /// Decoded payload, kept only for the duration of the run
    pub payload: Option<Value>,
    pub elapsed: Duration,
}

impl StepResult {
    pub fn status(&self) -> StepStatus {
        self.outcome.status()
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

/// Execute `spec` once via `transport`
pub async fn run_step(spec: &StepSpec, request: &Request, transport: &dyn Transport) -> StepResult {
    let started = Instant::now();
    let response = transport.execute(request).await;
    let elapsed = started.elapsed();

    let (outcome, detail, payload) = match response {
        Ok(payload) => match validator::validate(&payload, &spec.rule) {
            Ok(()) => {
                let detail = validator::highlight(&payload, &spec.highlights);
                (Outcome::Passed, detail, Some(payload))
            }
            Err(failure) => {
                let detail = failure.to_string();
                (Outcome::Failed(failure), detail, Some(payload))
            }
        },
        Err(error) => {
            let detail = error.to_string();
            (Outcome::Errored(error), detail, None)
        }
    };

    tracing::debug!(
        step = %spec.name,
        status = ?outcome.status(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Step finished"
    );

    StepResult {
        name: spec.name.clone(),
        request: request.clone(),
        outcome,
        detail,
        payload,
        elapsed,
    }
}
