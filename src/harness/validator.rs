//! Structural validation of response payloads
//!
//! Only top-level fields are addressed. A field that is present with a
//! `null` value counts as present; predicates on it fail.

use std::fmt;

use serde_json::{Map, Value};

use super::spec::{Predicate, ValidationRule};

/// Why a payload did not conform
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The payload is not a JSON object
    NotAMapping { found: &'static str },
    /// A required field is absent
    MissingField(String),
    /// A predicate evaluated false (or could not be evaluated)
    PredicateFailed { predicate: String, actual: String },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::NotAMapping { found } => {
                write!(f, "expected a JSON object, got {}", found)
            }
            Failure::MissingField(field) => write!(f, "missing field '{}'", field),
            Failure::PredicateFailed { predicate, actual } => {
                write!(f, "expected {}, got {}", predicate, actual)
            }
        }
    }
}

/// Check `payload` against `rule`
///
/// Required fields are checked first, in order, then predicates in order;
/// the first failure is returned.
pub fn validate(payload: &Value, rule: &ValidationRule) -> Result<(), Failure> {
    let map = match payload {
        Value::Object(map) => map,
        other => {
            return Err(Failure::NotAMapping {
                found: kind_of(other),
            })
        }
    };

    if let Some(missing) = rule.required.iter().find(|f| !map.contains_key(f.as_str())) {
        return Err(Failure::MissingField(missing.clone()));
    }

    for predicate in &rule.predicates {
        check(map, predicate)?;
    }

    Ok(())
}

fn check(map: &Map<String, Value>, predicate: &Predicate) -> Result<(), Failure> {
    let Some(value) = map.get(predicate.field()) else {
        return Err(Failure::MissingField(predicate.field().to_string()));
    };

    let failed = |actual: String| Failure::PredicateFailed {
        predicate: predicate.to_string(),
        actual,
    };

    match predicate {
        Predicate::Compare { op, threshold, .. } => match value.as_f64() {
            Some(actual) if op.holds(actual, *threshold) => Ok(()),
            Some(_) => Err(failed(value.to_string())),
            None => Err(failed(format!("{} ({})", value, kind_of(value)))),
        },
        Predicate::Length { op, threshold, .. } => {
            let len = match value {
                Value::Array(items) => items.len(),
                Value::Object(fields) => fields.len(),
                Value::String(s) => s.chars().count(),
                other => return Err(failed(format!("{} ({})", other, kind_of(other)))),
            };
            if op.holds(len as f64, *threshold) {
                Ok(())
            } else {
                Err(failed(format!("length {}", len)))
            }
        }
        Predicate::Equals { expected, .. } => {
            if value == expected {
                Ok(())
            } else {
                Err(failed(value.to_string()))
            }
        }
    }
}

/// Render `fields` of `payload` as `name=value` pairs
///
/// Strings are printed bare, floats with two decimals. Absent fields are
/// skipped.
pub fn highlight(payload: &Value, fields: &[String]) -> String {
    let Value::Object(map) = payload else {
        return String::new();
    };
    fields
        .iter()
        .filter_map(|name| map.get(name).map(|value| format!("{}={}", name, render(value))))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or_default()),
        Value::Array(items) => format!("[{} items]", items.len()),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
