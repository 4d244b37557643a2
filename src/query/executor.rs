//! Range query executor
//!
//! Runs the pipeline end to end:
//!
//! ```text
//! resolve time → compute step → build client → execute (bounded) → validate
//! ```
//!
//! Every stage either completes or the whole query fails; there is no retry
//! and no partial result.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

use super::auth::{AuthTransport, Credentials};
use super::result::{ApiResponse, Matrix, RawResult, ResponseStatus, ResultValidator};
use super::step::StepCalculator;
use super::time::TimeResolver;
use super::types::{Diagnostic, Diagnostics, QueryRequest, TimeRange};
use crate::error::{ExecutionCause, PromalyError, Result};

/// Deadline for a single range query
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Path of the range query endpoint, relative to the server URL
pub const QUERY_RANGE_PATH: &str = "api/v1/query_range";

/// Connection settings for the metrics server
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base URL, e.g. "http://localhost:9090"; a path prefix is kept
    pub server: String,
    pub credentials: Credentials,
    /// Hard deadline measured from the start of the call
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:9090".to_string(),
            credentials: Credentials::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Unresolved inputs for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub expression: String,
    /// Empty means ten minutes before `end`
    pub start: String,
    /// Empty means now
    pub end: String,
    /// Zero means auto-resolve
    pub step: Duration,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self {
            expression: "up".to_string(),
            start: "1 hour ago".to_string(),
            end: String::new(),
            step: Duration::from_secs(60),
        }
    }
}

/// Validated result of a range query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// What was actually sent
    pub request: QueryRequest,
    pub matrix: Matrix,
    pub diagnostics: Diagnostics,
}

/// Resolve the time bounds and step of `query` into a request
pub fn prepare_request(
    resolver: &TimeResolver,
    query: &RangeQuery,
    now: DateTime<Utc>,
) -> Result<(QueryRequest, Diagnostics)> {
    let resolved = resolver.resolve_at(&query.start, &query.end, now)?;
    let range = StepCalculator.resolve(TimeRange::new(resolved.start, resolved.end, query.step));

    Ok((
        QueryRequest::new(query.expression.clone(), range),
        resolved.diagnostics,
    ))
}

/// Run the full pipeline against the current wall-clock time
pub async fn query_range(config: &ExecutorConfig, query: &RangeQuery) -> Result<QueryOutcome> {
    query_range_at(config, query, Utc::now()).await
}

/// Run the full pipeline with an explicit reference time
pub async fn query_range_at(
    config: &ExecutorConfig,
    query: &RangeQuery,
    now: DateTime<Utc>,
) -> Result<QueryOutcome> {
    let (request, diagnostics) = prepare_request(&TimeResolver::new(), query, now)?;
    let executor = QueryExecutor::new(config)?;
    executor.fetch_matrix(request, diagnostics).await
}

/// Client bound to one metrics server
pub struct QueryExecutor {
    client: Client,
    endpoint: Url,
    timeout: Duration,
    validator: ResultValidator,
}

impl QueryExecutor {
    /// Build a client for `config.server`, with auth when credentials are set
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        let endpoint = query_range_url(&config.server)?;
        let transport = AuthTransport::new(config.credentials.clone());
        let client = transport.build_client()?;

        tracing::debug!(
            endpoint = %endpoint,
            auth = transport.is_active(),
            timeout = ?config.timeout,
            "Created Prometheus client"
        );

        Ok(Self {
            client,
            endpoint,
            timeout: config.timeout,
            validator: ResultValidator,
        })
    }

    /// Full URL of the range query endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `request` and keep only a matrix result
    ///
    /// Server warnings are appended to `diagnostics`.
    pub async fn fetch_matrix(
        &self,
        request: QueryRequest,
        mut diagnostics: Diagnostics,
    ) -> Result<QueryOutcome> {
        if !request.range.is_ordered() && !diagnostics.has_inverted_range() {
            diagnostics.push(Diagnostic::InvertedRange {
                start: request.range.start,
                end: request.range.end,
            });
        }

        let raw = self.execute(&request).await?;
        for warning in raw.warnings {
            diagnostics.push(Diagnostic::ServerWarning(warning));
        }

        let matrix = self.validator.validate(raw.data)?;
        tracing::info!(series = matrix.len(), query = %request.expression, "Range query complete");

        Ok(QueryOutcome {
            request,
            matrix,
            diagnostics,
        })
    }

    /// Send the range query under the deadline
    ///
    /// When the deadline elapses the in-flight request is dropped, which
    /// cancels it.
    pub async fn execute(&self, request: &QueryRequest) -> Result<RawResult> {
        tracing::info!(
            query = %request.expression,
            range = %request.range,
            "Querying {}",
            self.endpoint
        );

        match tokio::time::timeout(self.timeout, self.send(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PromalyError::QueryExecution(ExecutionCause::Timeout(self.timeout))),
        }
    }

    async fn send(&self, request: &QueryRequest) -> std::result::Result<RawResult, ExecutionCause> {
        let params = request.params();

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let rejected = status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED;
        let response = if rejected {
            tracing::debug!(status = status.as_u16(), "POST rejected by server, falling back to GET");
            self.client
                .get(self.endpoint.clone())
                .query(&params)
                .send()
                .await?
        } else {
            response
        };

        decode_response(response).await
    }
}

/// Validate the server address and append the endpoint path
fn query_range_url(server: &str) -> Result<Url> {
    let mut url = Url::parse(server.trim())
        .map_err(|e| PromalyError::ClientConstruction(format!("invalid server address {:?}: {}", server, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PromalyError::ClientConstruction(format!(
            "unsupported scheme {:?} in server address {:?}",
            url.scheme(),
            server
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(PromalyError::ClientConstruction(format!(
            "server address {:?} has no host",
            server
        )));
    }

    let path = format!("{}/{}", url.path().trim_end_matches('/'), QUERY_RANGE_PATH);
    url.set_path(&path);
    Ok(url)
}

async fn decode_response(response: reqwest::Response) -> std::result::Result<RawResult, ExecutionCause> {
    let status = response.status();
    let body = response.bytes().await?;

    let envelope: ApiResponse = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(ExecutionCause::Decode(e.to_string())),
        Err(_) => {
            return Err(ExecutionCause::Server {
                status: status.as_u16(),
                error_type: "http".to_string(),
                message: non_empty_or_reason(String::from_utf8_lossy(&body).trim(), status),
            })
        }
    };

    if envelope.status == ResponseStatus::Error || !status.is_success() {
        return Err(ExecutionCause::Server {
            status: status.as_u16(),
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: non_empty_or_reason(envelope.error.as_deref().unwrap_or(""), status),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| ExecutionCause::Decode("response has no data".to_string()))?;

    Ok(RawResult {
        data,
        warnings: envelope.warnings,
    })
}

fn non_empty_or_reason(message: &str, status: StatusCode) -> String {
    if message.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        message.to_string()
    }
}
