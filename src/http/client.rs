//! HTTP transport
//!
//! Executes exactly one request per call, with no retries. Every call
//! resolves to a decoded JSON payload or a [`TransportError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;

use super::request::{Request, JSON_CONTENT_TYPE};
use crate::common::config::HttpConfig;
use crate::common::Result;
use crate::harness::spec::Method;

/// Failure of a single request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The service could not be reached (refused, DNS, timeout)
    #[error("service unreachable at {url}: {message}")]
    ConnectionFailure { url: String, message: String },

    /// The service answered with a non-2xx status
    #[error("HTTP {status}{}", detail_suffix(.detail))]
    HttpError {
        status: u16,
        /// Structured error body when the service sent JSON
        body: Option<Value>,
        /// Short rendering of the error body
        detail: Option<String>,
    },

    /// The response is not valid JSON, or was cut off
    #[error("invalid response: {0}")]
    DecodeFailure(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

impl TransportError {
    /// Whether this failure makes the remaining steps meaningless
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::ConnectionFailure { .. })
    }

    /// Stable tag for reports
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailure { .. } => "connection_failure",
            TransportError::HttpError { .. } => "http_error",
            TransportError::DecodeFailure(_) => "decode_failure",
        }
    }
}

/// Executes resolved requests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> std::result::Result<Value, TransportError>;
}

/// reqwest-backed transport
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn execute(&self, request: &Request) -> std::result::Result<Value, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, request.url.clone())
            .header(ACCEPT, JSON_CONTENT_TYPE);
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, request.content_type.unwrap_or(JSON_CONTENT_TYPE))
                .body(body.clone());
        }

        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        let response = builder.send().await.map_err(|e| send_error(&request.url, &e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::ConnectionFailure {
                    url: request.url.to_string(),
                    message: describe(&e),
                }
            } else {
                TransportError::DecodeFailure(format!("failed to read body: {}", e))
            }
        })?;

        tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "Received response");

        if !status.is_success() {
            return Err(http_error(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::DecodeFailure(format!("not valid JSON: {}", e)))
    }
}

/// Build an `HttpError`, keeping the body if it is JSON
fn http_error(status: u16, bytes: &[u8]) -> TransportError {
    let body: Option<Value> = serde_json::from_slice(bytes).ok();
    let detail = match &body {
        // FastAPI-style `{"detail": ...}`
        Some(Value::Object(map)) => map
            .get("detail")
            .map(|d| match d {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .or_else(|| Some(Value::Object(map.clone()).to_string())),
        Some(other) => Some(other.to_string()),
        None => {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            (!text.is_empty()).then(|| truncate(&text, 200))
        }
    };
    TransportError::HttpError {
        status,
        body,
        detail,
    }
}

/// Only a failed connect or a timeout means the service is unreachable.
/// Anything after the connection is up (reset, truncated response) is a
/// bad response from a reachable service.
fn send_error(url: &url::Url, error: &reqwest::Error) -> TransportError {
    if error.is_connect() || error.is_timeout() {
        TransportError::ConnectionFailure {
            url: url.to_string(),
            message: describe(error),
        }
    } else {
        TransportError::DecodeFailure(format!("no complete response: {}", error))
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
