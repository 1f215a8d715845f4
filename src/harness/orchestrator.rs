//! Harness orchestration
//!
//! Runs a resolved plan strictly in order. The only early exit is a
//! connection failure, which marks the run aborted and skips the rest.

use serde::Serialize;
use url::Url;

use super::spec::StepSpec;
use super::step::{run_step, StepResult, StepStatus};
use crate::common::Result;
use crate::http::{request, Request, Transport};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

/// A plan whose requests have all been resolved
#[derive(Debug)]
pub struct Harness {
    steps: Vec<(StepSpec, Request)>,
    state: RunState,
}

impl Harness {
    /// Resolve every step of `plan` against `base`
    ///
    /// Fails on the first step that cannot be built; nothing is sent.
    pub fn new(plan: Vec<StepSpec>, base: &Url) -> Result<Self> {
        let steps = plan
            .into_iter()
            .map(|spec| {
                let request = request::build(&spec, base)?;
                Ok((spec, request))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            steps,
            state: RunState::NotStarted,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolved steps, in execution order
    pub fn steps(&self) -> impl Iterator<Item = (&StepSpec, &Request)> {
        self.steps.iter().map(|(spec, request)| (spec, request))
    }

    /// Execute the plan once
    ///
    /// `on_step` sees each result as soon as it is recorded. Consumes the
    /// harness so no step can be issued twice.
    pub async fn run<F>(mut self, transport: &dyn Transport, mut on_step: F) -> RunSummary
    where
        F: FnMut(&StepResult),
    {
        let plan = std::mem::take(&mut self.steps);
        let mut results = Vec::with_capacity(plan.len());
        let mut steps = plan.iter();

        for (spec, request) in steps.by_ref() {
            if self.state == RunState::NotStarted {
                self.transition(RunState::Running);
            }

            let result = run_step(spec, request, transport).await;
            let fatal = result.outcome.is_fatal();
            on_step(&result);
            results.push(result);

            if fatal {
                self.transition(RunState::Aborted);
                break;
            }
        }

        let skipped: Vec<String> = steps.map(|(spec, _)| spec.name.clone()).collect();
        if self.state == RunState::Aborted {
            tracing::warn!(skipped = skipped.len(), "Service unreachable, remaining steps skipped");
        } else {
            self.transition(RunState::Completed);
        }

        RunSummary {
            results,
            skipped,
            state: self.state,
        }
    }

    fn transition(&mut self, next: RunState) {
        tracing::info!(from = ?self.state, to = ?next, "Run state changed");
        self.state = next;
    }
}

/// Aggregate outcome of a run
#[derive(Debug)]
pub struct RunSummary {
    /// Executed steps, in execution order
    pub results: Vec<StepResult>,
    /// Names of steps not executed because the run aborted
    pub skipped: Vec<String>,
    pub state: RunState,
}

impl RunSummary {
    fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(StepStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    pub fn errored(&self) -> usize {
        self.count(StepStatus::Errored)
    }

    /// True only for a completed run in which every step passed
    pub fn all_passed(&self) -> bool {
        self.state == RunState::Completed
            && self.skipped.is_empty()
            && self.results.iter().all(StepResult::passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::spec::{Comparison, Predicate, ValidationRule};
    use crate::http::request::parse_base_url;
    use crate::http::TransportError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers by request path and records every path it was asked for
    #[derive(Default)]
    struct Scripted {
        responses: HashMap<String, std::result::Result<Value, TransportError>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn on(mut self, path: &str, response: std::result::Result<Value, TransportError>) -> Self {
            self.responses.insert(path.to_string(), response);
            self
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, request: &Request) -> std::result::Result<Value, TransportError> {
            let path = request.url.path().to_string();
            self.seen.lock().unwrap().push(path.clone());
            self.responses
                .get(&path)
                .cloned()
                .unwrap_or(Err(TransportError::HttpError {
                    status: 404,
                    body: None,
                    detail: None,
                }))
        }
    }

    fn unreachable() -> std::result::Result<Value, TransportError> {
        Err(TransportError::ConnectionFailure {
            url: "http://127.0.0.1:8000".to_string(),
            message: "connection failed".to_string(),
        })
    }

    fn plan() -> Vec<StepSpec> {
        vec![
            StepSpec::get("health", "/health").rule(ValidationRule::require(&["status"])),
            StepSpec::get("range", "/range").rule(
                ValidationRule::require(&["count"])
                    .with(Predicate::compare("count", Comparison::Ge, 1.0)),
            ),
            StepSpec::get("last", "/last").rule(ValidationRule::require(&["close"])),
        ]
    }

    fn harness() -> Harness {
        Harness::new(plan(), &parse_base_url("http://127.0.0.1:8000").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_all_pass_completes_with_exit_zero() {
        let transport = Scripted::default()
            .on("/health", Ok(json!({"status": "ok"})))
            .on("/range", Ok(json!({"count": 3})))
            .on("/last", Ok(json!({"close": 1.5})));

        let harness = harness();
        assert_eq!(harness.state(), RunState::NotStarted);

        let mut reported = Vec::new();
        let summary = harness
            .run(&transport, |r| reported.push(r.name.clone()))
            .await;

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.passed(), 3);
        assert!(summary.all_passed());
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(reported, vec!["health", "range", "last"]);
        assert_eq!(transport.seen(), vec!["/health", "/range", "/last"]);
    }

    #[tokio::test]
    async fn test_connection_failure_aborts_remaining_steps() {
        let transport = Scripted::default().on("/health", unreachable());

        let summary = harness().run(&transport, |_| {}).await;

        assert_eq!(summary.state, RunState::Aborted);
        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.errored(), 1);
        assert_eq!(summary.skipped, vec!["range", "last"]);
        assert!(!summary.all_passed());
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(transport.seen(), vec!["/health"]);
    }

    #[tokio::test]
    async fn test_connection_failure_mid_run() {
        let transport = Scripted::default()
            .on("/health", Ok(json!({"status": "ok"})))
            .on("/range", unreachable());

        let summary = harness().run(&transport, |_| {}).await;

        assert_eq!(summary.state, RunState::Aborted);
        assert_eq!(summary.passed(), 1);
        assert_eq!(summary.skipped, vec!["last"]);
        assert_eq!(transport.seen(), vec!["/health", "/range"]);
    }

    #[tokio::test]
    async fn test_non_fatal_failures_continue() {
        let transport = Scripted::default()
            .on("/health", Err(TransportError::DecodeFailure("eof".to_string())))
            .on("/range", Ok(json!({"count": 0})));
        // "/last" falls through to a 404

        let summary = harness().run(&transport, |_| {}).await;

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.errored(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(summary.skipped.is_empty());
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_empty_plan_completes() {
        let harness = Harness::new(Vec::new(), &parse_base_url("http://127.0.0.1:8000").unwrap())
            .unwrap();
        assert!(harness.is_empty());
        let summary = harness.run(&Scripted::default(), |_| {}).await;
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_invalid_step_rejects_whole_plan() {
        let mut steps = plan();
        steps.push(StepSpec::get("broken", "/prices/{symbol}"));
        let err = Harness::new(steps, &parse_base_url("http://127.0.0.1:8000").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
