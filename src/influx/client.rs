//! InfluxDB 1.x HTTP client for chunk query execution.
//!
//! This module provides the production [`QueryExecutor`] backed by the
//! InfluxDB 1.x `/query` endpoint. Key features:
//!
//! - **Millisecond timestamps** requested via `epoch=ms`, matching the
//!   template placeholders
//! - **Secure credential handling** via `secrecy::SecretString`
//! - **InfluxDB error mapping** for transport failures, HTTP error statuses
//!   and statement-level error payloads
//! - **Request timeout** at this boundary, so a hung query surfaces as an
//!   execution failure instead of blocking a job forever

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::InfluxConfig;
use crate::error::AppError;
use crate::export::executor::{QueryExecutor, RowSet};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all InfluxDB requests.
const CLIENT_USER_AGENT: &str = "influx2csv/0.1.0";

/// Per-request timeout in seconds. Expiry is reported as an execution
/// failure for the chunk in flight.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match InfluxDB JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level `/query` response body.
#[derive(Debug, Deserialize)]
struct WireQueryResponse {
    #[serde(default)]
    results: Vec<WireStatementResult>,
}

/// Result of one statement within the query.
#[derive(Debug, Deserialize)]
struct WireStatementResult {
    #[serde(default)]
    series: Vec<WireSeries>,
    /// Statement-level error; present even on HTTP 200 responses.
    #[serde(default)]
    error: Option<String>,
}

/// One series: shared column names plus value rows.
#[derive(Debug, Deserialize)]
struct WireSeries {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Error body InfluxDB returns with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// InfluxClient
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for executing queries against one InfluxDB database.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    query_url: Url,
    database: String,
    username: Option<String>,
    password: Option<SecretString>,
}

impl InfluxClient {
    /// Creates a client for the instance and database named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the URL is unusable or the HTTP client
    /// fails to initialize.
    pub fn new(config: &InfluxConfig) -> Result<Self, AppError> {
        let base = Url::parse(&config.url).map_err(|e| {
            AppError::Config(format!("invalid InfluxDB URL '{}': {}", config.url, e))
        })?;

        let mut query_url = base.clone();
        query_url
            .path_segments_mut()
            .map_err(|_| {
                AppError::Config(format!("InfluxDB URL '{}' cannot be a base", config.url))
            })?
            .push("query");

        Ok(Self {
            http: build_http_client()?,
            query_url,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Executes one query and decodes the response into a [`RowSet`].
    ///
    /// The query is sent as a `GET /query` request with `db`, `q` and
    /// `epoch=ms` parameters, with basic auth when a username is configured.
    async fn run_query(&self, query: &str) -> Result<RowSet, AppError> {
        let mut url = self.query_url.clone();
        url.query_pairs_mut()
            .append_pair("db", &self.database)
            .append_pair("q", query)
            .append_pair("epoch", "ms");

        let mut request = self.http.get(url);
        if let Some(username) = &self.username {
            request = request.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret()),
            );
        }

        let response = request.send().await.map_err(|e| {
            AppError::Execution(format!("request to InfluxDB failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        let wire: WireQueryResponse = response.json().await.map_err(|e| {
            AppError::Execution(format!("failed to parse InfluxDB response: {}", e))
        })?;

        let rows = rows_from_response(wire)?;
        debug!(rows = rows.len(), "Query returned");
        Ok(rows)
    }
}

impl QueryExecutor for InfluxClient {
    fn execute<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RowSet, AppError>> + Send + 'a>> {
        Box::pin(self.run_query(query))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Maps a non-2xx response to an execution error, preferring the JSON error
/// body InfluxDB usually returns.
async fn error_from_response(response: reqwest::Response, status: StatusCode) -> AppError {
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("unable to read error body"));

    if let Ok(parsed) = serde_json::from_str::<WireErrorResponse>(&body) {
        return AppError::Execution(format!(
            "InfluxDB error (HTTP {}): {}",
            status.as_u16(),
            parsed.error
        ));
    }

    AppError::Execution(format!(
        "HTTP {} - {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error")
    ))
}

/// Flattens a decoded response into one tabular row set.
///
/// Series are concatenated in response order and must agree on their columns;
/// a statement-level error or a ragged row makes the whole chunk fail.
fn rows_from_response(wire: WireQueryResponse) -> Result<RowSet, AppError> {
    let mut out = RowSet::default();

    for statement in wire.results {
        if let Some(message) = statement.error {
            return Err(AppError::Execution(format!(
                "InfluxDB returned an error: {}",
                message
            )));
        }

        for series in statement.series {
            if out.columns.is_empty() {
                out.columns = series.columns;
            } else if series.columns != out.columns {
                return Err(AppError::Execution(format!(
                    "series disagree on columns: [{}] vs [{}]",
                    out.columns.join(", "),
                    series.columns.join(", ")
                )));
            }

            for row in series.values {
                if row.len() != out.columns.len() {
                    return Err(AppError::Execution(format!(
                        "malformed response: row has {} values but {} columns",
                        row.len(),
                        out.columns.len()
                    )));
                }
                out.rows.push(row);
            }
        }
    }

    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
