//! End-to-end integration tests for the harness
//!
//! These tests verify the complete run by:
//! 1. Starting the mock market-data service on a free port
//! 2. Running the harness binary (or the library transport) against it
//! 3. Verifying per-step lines, the summary and the exit code

use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};

use market_smoke::common::config::HttpConfig;
use market_smoke::harness::spec::StepSpec;
use market_smoke::http::request::{build, parse_base_url};
use market_smoke::{HttpClient, Transport, TransportError};

/// A running mock service, killed on drop
struct MockService {
    child: Child,
    base_url: String,
}

impl MockService {
    fn start(extra_args: &[&str]) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_mock_service"))
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start mock service");

        let stdout = child.stdout.take().expect("No mock service stdout");
        let mut line = String::new();
        BufReader::new(stdout)
            .read_line(&mut line)
            .expect("Failed to read mock service output");
        let addr = listen_address(&line)
            .unwrap_or_else(|| panic!("Unexpected mock service output: {line:?}"));

        Self {
            child,
            base_url: format!("http://{addr}"),
        }
    }
}

/// Address from the mock's `mock service listening at: <addr>` line
fn listen_address(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("mock service listening at:")
        .map(str::trim)
}

impl Drop for MockService {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Test context with an isolated, empty configuration file
struct TestContext {
    _config_dir: tempfile::TempDir,
    config_path: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let config_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = config_dir.path().join("config.toml");
        std::fs::write(&config_path, "").expect("Failed to write config");
        Self {
            _config_dir: config_dir,
            config_path,
        }
    }

    /// Run the harness binary with the given arguments
    fn harness(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_market-smoke"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run harness")
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Lines for executed steps, as (tag, name)
fn step_lines(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            ["✓ PASS", "✗ FAIL", "! ERROR", "- SKIP"]
                .iter()
                .find(|tag| line.starts_with(**tag))
                .map(|tag| {
                    let name = line[tag.len()..]
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    (tag.to_string(), name)
                })
        })
        .collect()
}

/// Base URL of a port nothing is listening on
fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn client() -> HttpClient {
    HttpClient::new(&HttpConfig {
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_full_run_passes_against_healthy_service() {
    let service = MockService::start(&[]);
    let ctx = TestContext::new();

    let output = ctx.harness(&[
        "run",
        "--base-url",
        &service.base_url,
        "--symbol",
        "VOO",
        "--start",
        "2025-01-01",
        "--end",
        "2025-09-10",
        "--interval",
        "1d",
    ]);
    let stdout = stdout_of(&output);

    assert_eq!(output.status.code(), Some(0), "stdout:\n{stdout}");
    let lines = step_lines(&stdout);
    let names: Vec<&str> = lines.iter().map(|(_, n)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "health",
            "ready",
            "ingest",
            "prices-range",
            "prices-last",
            "ingest-latest",
            "metrics-basic",
            "metrics-advanced",
            "signals-tech",
        ]
    );
    assert!(lines.iter().all(|(tag, _)| tag == "✓ PASS"), "stdout:\n{stdout}");
    assert!(stdout.contains("status=ok"));
    assert!(stdout.contains("sharpe=0.60"));
    assert!(stdout.contains("9 passed, 0 failed, 0 errored, 0 skipped"));
}

#[test]
fn test_unreachable_service_aborts_after_first_step() {
    let ctx = TestContext::new();
    let base_url = unreachable_base_url();

    let output = ctx.harness(&["run", "--base-url", &base_url]);
    let stdout = stdout_of(&output);

    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
    let lines = step_lines(&stdout);
    assert_eq!(lines[0], ("! ERROR".to_string(), "health".to_string()));
    assert!(lines[1..].iter().all(|(tag, _)| tag == "- SKIP"));
    assert_eq!(lines.len(), 9);
    assert!(stdout.contains("0 passed, 0 failed, 1 errored, 8 skipped"));
    assert!(stdout.contains("aborted"));
}

#[test]
fn test_missing_data_fails_but_run_continues() {
    let service = MockService::start(&["--no-data"]);
    let ctx = TestContext::new();

    let output = ctx.harness(&["run", "--base-url", &service.base_url, "--symbol", "NONE"]);
    let stdout = stdout_of(&output);

    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
    let lines = step_lines(&stdout);
    assert_eq!(lines.len(), 9, "stdout:\n{stdout}");
    assert!(lines.iter().all(|(tag, _)| tag != "- SKIP"));

    let tag_of = |name: &str| {
        lines
            .iter()
            .find(|(_, n)| n == name)
            .map(|(tag, _)| tag.as_str())
            .unwrap()
    };
    assert_eq!(tag_of("ingest"), "✗ FAIL");
    assert_eq!(tag_of("prices-range"), "✗ FAIL");
    assert_eq!(tag_of("prices-last"), "! ERROR");
    assert_eq!(tag_of("signals-tech"), "✓ PASS");
    assert!(stdout.contains("expected count >= 1, got 0"));
    assert!(stdout.contains("HTTP 404: No data for ticker NONE"));
}

#[test]
fn test_latest_variant_runs_three_steps() {
    let service = MockService::start(&[]);
    let ctx = TestContext::new();

    // Nothing ingested yet: the last-bar read is a 404
    let output = ctx.harness(&["latest", "--base-url", &service.base_url, "--symbol", "voo"]);
    let stdout = stdout_of(&output);
    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
    let names: Vec<String> = step_lines(&stdout).into_iter().map(|(_, n)| n).collect();
    assert_eq!(names, vec!["health", "prices-last", "ingest-latest"]);

    // After a full run has stored data, every step passes
    let full = ctx.harness(&["run", "--base-url", &service.base_url]);
    assert_eq!(full.status.code(), Some(0));
    let output = ctx.harness(&["latest", "--base-url", &service.base_url]);
    assert_eq!(output.status.code(), Some(0), "stdout:\n{}", stdout_of(&output));
}

#[test]
fn test_json_report() {
    let service = MockService::start(&[]);
    let ctx = TestContext::new();

    let output = ctx.harness(&["latest", "--base-url", &service.base_url, "--json"]);
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");

    assert_eq!(report["state"], "completed");
    assert_eq!(report["all_passed"], false);
    assert_eq!(report["steps"].as_array().unwrap().len(), 3);
    assert_eq!(report["steps"][1]["status"], "errored");
    assert_eq!(report["steps"][1]["error"], "http_error");
}

#[test]
fn test_plan_prints_requests_without_sending() {
    let ctx = TestContext::new();
    let base_url = unreachable_base_url();

    let output = ctx.harness(&["plan", "--base-url", &base_url]);
    let stdout = stdout_of(&output);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout.lines().count(), 9);
    assert!(stdout.contains(&format!(
        "POST {base_url}/ingest/VOO?start=2025-01-01&end=2025-09-10&interval=1d"
    )));
}

#[test]
fn test_invalid_arguments_exit_one() {
    let ctx = TestContext::new();

    let output = ctx.harness(&["run", "--start", "2025-09-10", "--end", "2025-01-01"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("after end date"));

    let output = ctx.harness(&["run", "--base-url", "not a url"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid base URL"));
}

#[tokio::test]
async fn test_transport_error_kinds() {
    let service = MockService::start(&[]);
    let base = parse_base_url(&service.base_url).unwrap();
    let client = client();

    let ok = build(&StepSpec::get("health", "/health"), &base).unwrap();
    assert_eq!(
        client.execute(&ok).await.unwrap(),
        serde_json::json!({"status": "ok"})
    );

    let missing = build(
        &StepSpec::get("prices-last", "/prices/{symbol}/db/last").path_param("symbol", "ZZZ"),
        &base,
    )
    .unwrap();
    match client.execute(&missing).await {
        Err(TransportError::HttpError { status, body, .. }) => {
            assert_eq!(status, 404);
            assert_eq!(body.unwrap()["detail"], "No data for ticker ZZZ");
        }
        other => panic!("Expected HttpError, got {other:?}"),
    }

    let plain = build(&StepSpec::get("plain", "/debug/plain"), &base).unwrap();
    assert!(matches!(
        client.execute(&plain).await,
        Err(TransportError::DecodeFailure(_))
    ));

    // Accepted, then closed with no response: bad response, not unreachable
    let dropped = build(&StepSpec::get("drop", "/debug/drop"), &base).unwrap();
    match client.execute(&dropped).await {
        Err(err @ TransportError::DecodeFailure(_)) => assert!(!err.is_fatal()),
        other => panic!("Expected DecodeFailure, got {other:?}"),
    }

    let down = parse_base_url(&unreachable_base_url()).unwrap();
    let request = build(&StepSpec::get("health", "/health"), &down).unwrap();
    let err = client.execute(&request).await.unwrap_err();
    assert!(err.is_fatal(), "Expected ConnectionFailure, got {err:?}");
}

#[tokio::test]
async fn test_post_body_is_sent_as_json() {
    let service = MockService::start(&[]);
    let base = parse_base_url(&service.base_url).unwrap();

    let mut body = serde_json::Map::new();
    body.insert("name".to_string(), serde_json::json!("core"));
    body.insert("tickers".to_string(), serde_json::json!(["VOO", "BND"]));
    let spec = StepSpec::post("echo", "/debug/echo").body(body);
    let request = build(&spec, &base).unwrap();

    let echoed = client().execute(&request).await.unwrap();
    assert_eq!(echoed["content_type"], "application/json");
    assert_eq!(
        echoed["body"],
        serde_json::json!({"name": "core", "tickers": ["VOO", "BND"]})
    );
}

#[test]
fn test_zero_timeout_rejected() {
    let ctx = TestContext::new();
    let output = ctx.harness(&["run", "--timeout", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--timeout"), "stderr: {stderr}");
}

#[test]
fn test_listen_address() {
    assert_eq!(
        listen_address("mock service listening at: 127.0.0.1:4123\n"),
        Some("127.0.0.1:4123")
    );
    assert_eq!(listen_address("starting up"), None);
}
