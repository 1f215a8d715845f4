//! Mock market-data service for integration testing
//!
//! This binary implements a minimal HTTP/1.1 server exposing the service's
//! health, ingestion, price, metric and signal endpoints with canned
//! values, so the harness can be exercised without a database or a
//! market-data provider.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};

use chrono::{Datelike, NaiveDate, Weekday};
use clap::Parser;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mock_service", about = "In-memory stand-in for the market-data service")]
struct Args {
    /// Port to bind on 127.0.0.1 (0 picks a free port)
    #[arg(long, default_value = "0")]
    port: u16,

    /// Ingestion stores nothing, as for a symbol the provider does not know
    #[arg(long)]
    no_data: bool,
}

fn main() {
    let args = Args::parse();

    let listener = TcpListener::bind(("127.0.0.1", args.port)).expect("failed to bind");
    let addr = listener.local_addr().expect("no local address");
    println!("mock service listening at: {}", addr);
    std::io::stdout().flush().ok();

    let mut state = MockState {
        no_data: args.no_data,
        bars: HashMap::new(),
    };

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_connection(stream, &mut state) {
                    eprintln!("mock service: {}", e);
                }
            }
            Err(e) => eprintln!("mock service: accept failed: {}", e),
        }
    }
}

struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

struct HttpResponse {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl HttpResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn not_found(detail: &str) -> Self {
        Self::json(404, json!({ "detail": detail }))
    }
}

fn handle_connection(stream: TcpStream, state: &mut MockState) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let Some(request) = read_request(&mut reader)? else {
        return Ok(());
    };

    // Close without answering, as a crashing handler would
    if request.path == "/debug/drop" {
        return Ok(());
    }

    let response = state.route(&request);
    write_response(stream, &response)
}

fn read_request<R: BufRead>(reader: &mut R) -> std::io::Result<Option<HttpRequest>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or("/").to_string();

    let mut content_length = 0usize;
    let mut content_type = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (
            path.to_string(),
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (target, HashMap::new()),
    };

    Ok(Some(HttpRequest {
        method,
        path,
        query,
        content_type,
        body,
    }))
}

fn write_response(mut stream: TcpStream, response: &HttpResponse) -> std::io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        404 => "Not Found",
        405 => "Method Not Allowed",
        422 => "Unprocessable Entity",
        _ => "Unknown",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}

struct MockState {
    no_data: bool,
    /// Stored bar dates per ticker
    bars: HashMap<String, Vec<NaiveDate>>,
}

impl MockState {
    fn route(&mut self, request: &HttpRequest) -> HttpResponse {
        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", []) => HttpResponse::json(200, json!({ "message": "Market data API running" })),
            ("GET", ["health"]) | ("GET", ["ready"]) => {
                HttpResponse::json(200, json!({ "status": "ok" }))
            }
            ("GET", ["debug", "plain"]) => HttpResponse {
                status: 200,
                content_type: "text/plain",
                body: "not json".to_string(),
            },
            ("POST", ["debug", "echo"]) => HttpResponse::json(
                200,
                json!({
                    "content_type": request.content_type,
                    "body": serde_json::from_slice::<Value>(&request.body).unwrap_or(Value::Null),
                }),
            ),
            ("POST", ["ingest", ticker]) => self.ingest(ticker, &request.query),
            ("POST", ["ingest", ticker, "latest"]) => self.ingest_latest(ticker),
            ("GET", ["prices", ticker, "db", "range"]) => self.range(ticker, &request.query),
            ("GET", ["prices", ticker, "db", "last"]) => self.last(ticker),
            ("GET", ["metrics", ticker, "basic"]) => match range_params(&request.query) {
                Ok((start, end)) => HttpResponse::json(
                    200,
                    json!({
                        "ticker": ticker.to_uppercase(),
                        "start": start.to_string(),
                        "end": end.to_string(),
                        "n": self.stored_between(ticker, start, end),
                        "ann_return": 0.1234,
                        "ann_volatility": 0.1712,
                        "sharpe": 0.6039,
                        "max_drawdown": -0.0921,
                        "rf": query_f64(&request.query, "rf"),
                    }),
                ),
                Err(response) => response,
            },
            ("GET", ["metrics", ticker, "advanced"]) => match range_params(&request.query) {
                Ok((start, end)) => HttpResponse::json(
                    200,
                    json!({
                        "ticker": ticker.to_uppercase(),
                        "start": start.to_string(),
                        "end": end.to_string(),
                        "n": self.stored_between(ticker, start, end),
                        "rf": query_f64(&request.query, "rf"),
                        "mar": query_f64(&request.query, "mar"),
                        "downside_volatility": 0.1103,
                        "sortino": 0.9377,
                        "calmar": 1.3398,
                        "ytd_return": 0.0871,
                    }),
                ),
                Err(response) => response,
            },
            ("GET", ["signals", ticker, "tech"]) => match range_params(&request.query) {
                Ok((start, end)) => HttpResponse::json(
                    200,
                    json!({
                        "ticker": ticker.to_uppercase(),
                        "start": start.to_string(),
                        "end": end.to_string(),
                        "count": self.stored_between(ticker, start, end),
                        "momentum_window": query_f64(&request.query, "window"),
                        "momentum": 0.065,
                        "sma_fast": 585.12,
                        "sma_slow": 570.45,
                        "cross_now": true,
                        "rsi_period": query_f64(&request.query, "rsi_period"),
                        "rsi": 56.7,
                    }),
                ),
                Err(response) => response,
            },
            (method, _) if method != "GET" && method != "POST" => {
                HttpResponse::json(405, json!({ "detail": "Method Not Allowed" }))
            }
            _ => HttpResponse::not_found("Not Found"),
        }
    }

    fn ingest(&mut self, ticker: &str, query: &HashMap<String, String>) -> HttpResponse {
        let (start, end) = match range_params(query) {
            Ok(range) => range,
            Err(response) => return response,
        };
        let ticker = ticker.to_uppercase();

        let new_dates: Vec<NaiveDate> = if self.no_data {
            Vec::new()
        } else {
            trading_days(start, end)
        };
        let stored = self.bars.entry(ticker.clone()).or_default();
        let before = stored.len();
        stored.extend(new_dates.iter().copied());
        stored.sort();
        stored.dedup();
        let inserted = stored.len() - before;

        HttpResponse::json(
            200,
            json!({
                "ticker": ticker,
                "start": start.to_string(),
                "end": end.to_string(),
                "interval": query.get("interval").cloned().unwrap_or_else(|| "1d".to_string()),
                "ingested": new_dates.len(),
                "upsert_effect": inserted,
            }),
        )
    }

    fn ingest_latest(&mut self, ticker: &str) -> HttpResponse {
        let ticker = ticker.to_uppercase();
        let last = self
            .bars
            .get(&ticker)
            .and_then(|dates| dates.last().copied());
        let (start, end) = match last {
            Some(date) => (date.to_string(), date.to_string()),
            None => (String::new(), String::new()),
        };
        HttpResponse::json(
            200,
            json!({
                "ticker": ticker,
                "start": start,
                "end": end,
                "ingested": 0,
                "upsert_effect": 0,
            }),
        )
    }

    fn range(&self, ticker: &str, query: &HashMap<String, String>) -> HttpResponse {
        let (start, end) = match range_params(query) {
            Ok(range) => range,
            Err(response) => return response,
        };
        let ticker = ticker.to_uppercase();
        let data: Vec<Value> = self
            .bars
            .get(&ticker)
            .map(|dates| {
                dates
                    .iter()
                    .filter(|d| **d >= start && **d <= end)
                    .enumerate()
                    .map(|(i, d)| candle(*d, i))
                    .collect()
            })
            .unwrap_or_default();

        HttpResponse::json(
            200,
            json!({
                "ticker": ticker,
                "start": start.to_string(),
                "end": end.to_string(),
                "count": data.len(),
                "data": data,
            }),
        )
    }

    fn last(&self, ticker: &str) -> HttpResponse {
        let ticker = ticker.to_uppercase();
        match self.bars.get(&ticker).and_then(|dates| dates.last()) {
            Some(date) => HttpResponse::json(
                200,
                json!({
                    "ticker": ticker,
                    "date": date.to_string(),
                    "close": 599.64,
                }),
            ),
            None => HttpResponse::not_found(&format!("No data for ticker {}", ticker)),
        }
    }

    fn stored_between(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> usize {
        self.bars
            .get(&ticker.to_uppercase())
            .map(|dates| dates.iter().filter(|d| **d >= start && **d <= end).count())
            .unwrap_or(0)
    }
}

fn range_params(query: &HashMap<String, String>) -> Result<(NaiveDate, NaiveDate), HttpResponse> {
    let parse = |name: &str| {
        query
            .get(name)
            .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
    };
    match (parse("start"), parse("end")) {
        (Some(start), Some(end)) if start <= end => Ok((start, end)),
        _ => Err(HttpResponse::json(
            422,
            json!({ "detail": "start and end must be dates with start <= end" }),
        )),
    }
}

fn query_f64(query: &HashMap<String, String>, name: &str) -> Value {
    query
        .get(name)
        .and_then(|v| v.parse::<f64>().ok())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn candle(date: NaiveDate, index: usize) -> Value {
    let close = 500.0 + index as f64 * 0.5;
    json!({
        "date": date.to_string(),
        "open": close - 1.0,
        "high": close + 2.0,
        "low": close - 2.0,
        "close": close,
        "volume": 1_000_000 + index * 1_000,
    })
}
