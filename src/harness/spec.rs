//! Step definition types
//!
//! A [`StepSpec`] is an immutable, declarative description of one check.
//! Plans are built from these once, before anything is sent.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

/// HTTP method of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar query-string value
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    /// Rendered as `YYYY-MM-DD`
    Date(NaiveDate),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(i) => write!(f, "{}", i),
            QueryValue::Float(x) => write!(f, "{}", x),
            QueryValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<NaiveDate> for QueryValue {
    fn from(value: NaiveDate) -> Self {
        QueryValue::Date(value)
    }
}

/// Comparison operator for numeric predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparison::Gt => actual > threshold,
            Comparison::Ge => actual >= threshold,
            Comparison::Lt => actual < threshold,
            Comparison::Le => actual <= threshold,
            Comparison::Eq => actual == threshold,
            Comparison::Ne => actual != threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// A check on one top-level field of the payload
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The field is a number and `value <op> threshold`
    Compare {
        field: String,
        op: Comparison,
        threshold: f64,
    },
    /// The field is an array, object or string whose length satisfies `<op> threshold`
    Length {
        field: String,
        op: Comparison,
        threshold: f64,
    },
    /// The field equals a fixed JSON value
    Equals { field: String, expected: Value },
}

impl Predicate {
    pub fn compare(field: &str, op: Comparison, threshold: f64) -> Self {
        Predicate::Compare {
            field: field.to_string(),
            op,
            threshold,
        }
    }

    pub fn length(field: &str, op: Comparison, threshold: f64) -> Self {
        Predicate::Length {
            field: field.to_string(),
            op,
            threshold,
        }
    }

    pub fn equals(field: &str, expected: impl Into<Value>) -> Self {
        Predicate::Equals {
            field: field.to_string(),
            expected: expected.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::Length { field, .. }
            | Predicate::Equals { field, .. } => field,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare {
                field,
                op,
                threshold,
            } => write!(f, "{} {} {}", field, op.symbol(), threshold),
            Predicate::Length {
                field,
                op,
                threshold,
            } => write!(f, "len({}) {} {}", field, op.symbol(), threshold),
            Predicate::Equals { field, expected } => write!(f, "{} == {}", field, expected),
        }
    }
}

/// Required fields plus predicates, checked in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRule {
    pub required: Vec<String>,
    pub predicates: Vec<Predicate>,
}

impl ValidationRule {
    pub fn require(fields: &[&str]) -> Self {
        Self {
            required: fields.iter().map(|f| f.to_string()).collect(),
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// Immutable description of one check
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub name: String,
    pub method: Method,
    /// Path with `{name}` placeholders, e.g. `/ingest/{symbol}`
    pub path: String,
    /// Values substituted into the path placeholders
    pub path_params: Vec<(String, String)>,
    /// Query parameters, in the order they are encoded
    pub query: Vec<(String, QueryValue)>,
    pub body: Option<Map<String, Value>>,
    pub rule: ValidationRule,
    /// Fields echoed in the detail line when the step passes
    pub highlights: Vec<String>,
}

impl StepSpec {
    pub fn new(name: &str, method: Method, path: &str) -> Self {
        Self {
            name: name.to_string(),
            method,
            path: path.to_string(),
            path_params: Vec::new(),
            query: Vec::new(),
            body: None,
            rule: ValidationRule::default(),
            highlights: Vec::new(),
        }
    }

    pub fn get(name: &str, path: &str) -> Self {
        Self::new(name, Method::Get, path)
    }

    pub fn post(name: &str, path: &str) -> Self {
        Self::new(name, Method::Post, path)
    }

    pub fn path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query(mut self, name: &str, value: impl Into<QueryValue>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn highlight(mut self, fields: &[&str]) -> Self {
        self.highlights = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}
