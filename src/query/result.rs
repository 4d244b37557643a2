//! Query results
//!
//! Decoding of the Prometheus HTTP API envelope and the result shape check.
//! The `data` object is modeled as a sum type with one variant per
//! `resultType`; only [`QueryData::Matrix`] survives validation.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PromalyError, Result};

/// Metric identity: label name to label value
pub type Labels = BTreeMap<String, String>;

/// Range query result, in server order
pub type Matrix = Vec<Series>;

/// One timestamped value
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, String)")]
pub struct Sample {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub value: f64,
}

impl TryFrom<(f64, String)> for Sample {
    type Error = String;

    fn try_from((ts, raw): (f64, String)) -> std::result::Result<Self, Self::Error> {
        let value = raw
            .parse::<f64>()
            .map_err(|e| format!("invalid sample value {:?}: {}", raw, e))?;
        Ok(Self {
            timestamp: seconds_to_millis(ts),
            value,
        })
    }
}

fn seconds_to_millis(ts: f64) -> i64 {
    (ts * 1000.0).round() as i64
}

/// A labeled series with chronologically ordered samples
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Series {
    #[serde(rename = "metric", default)]
    pub labels: Labels,
    #[serde(rename = "values", default)]
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(labels: Labels, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }

    /// Value of the `__name__` label, if any
    pub fn name(&self) -> Option<&str> {
        self.labels.get("__name__").map(String::as_str)
    }
}

impl fmt::Display for Series {
    /// `name{label="value", ...}` in the Prometheus text style
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest: Vec<String> = self
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != "__name__")
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect();

        match (self.name(), rest.is_empty()) {
            (Some(name), true) => write!(f, "{}", name),
            (Some(name), false) => write!(f, "{}{{{}}}", name, rest.join(", ")),
            (None, _) => write!(f, "{{{}}}", rest.join(", ")),
        }
    }
}

/// Element of an instant vector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstantSample {
    #[serde(rename = "metric", default)]
    pub labels: Labels,
    pub value: Sample,
}

/// `string` result: a timestamped string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(f64, String)")]
pub struct StringSample {
    pub timestamp: i64,
    pub value: String,
}

impl From<(f64, String)> for StringSample {
    fn from((ts, value): (f64, String)) -> Self {
        Self {
            timestamp: seconds_to_millis(ts),
            value,
        }
    }
}

/// The `data` object of a query response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryData {
    Matrix(Matrix),
    Vector(Vec<InstantSample>),
    Scalar(Sample),
    String(StringSample),
}

impl QueryData {
    /// Wire name of the result type
    pub fn kind(&self) -> &'static str {
        match self {
            QueryData::Matrix(_) => "matrix",
            QueryData::Vector(_) => "vector",
            QueryData::Scalar(_) => "scalar",
            QueryData::String(_) => "string",
        }
    }
}

/// `status` field of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Full response envelope from `/api/v1/query_range`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Decoded result plus any warnings the server attached
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub data: QueryData,
    pub warnings: Vec<String>,
}

/// Accepts only the range-matrix shape
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultValidator;

impl ResultValidator {
    /// Unwrap the matrix, unchanged; any other shape is rejected
    pub fn validate(&self, data: QueryData) -> Result<Matrix> {
        match data {
            QueryData::Matrix(matrix) => Ok(matrix),
            other => Err(PromalyError::UnsupportedResult(other.kind().to_string())),
        }
    }
}
