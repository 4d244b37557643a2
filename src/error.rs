//! Error types
//!
//! Every failure the range-query pipeline can produce. All of them are
//! terminal for the invocation; the only non-fatal condition (an inverted
//! time range) travels on the diagnostic channel instead, see
//! [`crate::query::Diagnostic`].

use std::fmt;
use thiserror::Error;

/// Which side of the time range failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Start,
    End,
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeField::Start => write!(f, "start"),
            TimeField::End => write!(f, "end"),
        }
    }
}

/// Underlying cause of a failed range query
#[derive(Error, Debug)]
pub enum ExecutionCause {
    /// The deadline elapsed before the server answered
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Connection, TLS or body transfer failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error envelope or a non-success status
    #[error("server error {status} ({error_type}): {message}")]
    Server {
        status: u16,
        error_type: String,
        message: String,
    },

    /// The response body was not a valid query response
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Errors produced by the query pipeline and its collaborators
#[derive(Error, Debug)]
pub enum PromalyError {
    /// The server address or HTTP client configuration is unusable
    #[error("failed to create Prometheus client: {0}")]
    ClientConstruction(String),

    /// Every time parser strategy rejected the input
    #[error("error parsing {field} time {input:?}: {reason}")]
    TimeParse {
        field: TimeField,
        input: String,
        reason: String,
    },

    /// Network, server or timeout failure during the bounded call
    #[error("failed to query Prometheus: {0}")]
    QueryExecution(#[from] ExecutionCause),

    /// The server returned something other than a range matrix
    #[error("unsupported result format: {0}")]
    UnsupportedResult(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Rendering the matrix failed
    #[error("render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for PromalyError {
    fn from(err: csv::Error) -> Self {
        PromalyError::Render(err.to_string())
    }
}

impl From<serde_json::Error> for PromalyError {
    fn from(err: serde_json::Error) -> Self {
        PromalyError::Render(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PromalyError>;
