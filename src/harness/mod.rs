//! Contract-check harness
//!
//! Declarative steps are resolved into requests up front, executed one at
//! a time against the service, validated structurally and aggregated into
//! a [`RunSummary`] whose exit code is the machine-readable result.

pub mod orchestrator;
pub mod plan;
pub mod report;
pub mod spec;
pub mod step;
pub mod validator;

pub use orchestrator::{Harness, RunState, RunSummary};
pub use plan::{full_plan, latest_plan, PlanParams};
pub use spec::{Comparison, Method, Predicate, QueryValue, StepSpec, ValidationRule};
pub use step::{run_step, Outcome, StepResult, StepStatus};
