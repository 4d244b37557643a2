//! Promaly Range Query Pipeline
//!
//! Builds, sends and validates a single Prometheus range query:
//!
//! - **time**: TimeResolver and the ordered TimeParser strategies
//! - **natural**: Natural-language expressions ("1 hour ago", "yesterday")
//! - **step**: StepCalculator and step duration parsing
//! - **auth**: Basic-auth decoration of the HTTP client
//! - **executor**: QueryExecutor, the bounded remote call
//! - **result**: Response decoding and the matrix-only ResultValidator
//! - **types**: TimeRange, QueryRequest and the diagnostic channel
//!
//! # Example
//!
//! ```rust,no_run
//! use promaly::query::{query_range, ExecutorConfig, RangeQuery};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let query = RangeQuery {
//!         expression: "rate(process_cpu_seconds_total[5m])".to_string(),
//!         start: "1 hour ago".to_string(),
//!         end: String::new(),
//!         step: Duration::ZERO,
//!     };
//!
//!     let outcome = query_range(&ExecutorConfig::default(), &query).await?;
//!     for series in &outcome.matrix {
//!         println!("{}: {} samples", series, series.samples.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

mod auth;
mod executor;
mod natural;
mod result;
mod step;
mod time;
mod types;

pub use auth::{AuthTransport, Credentials};
pub use executor::{
    prepare_request, query_range, query_range_at, ExecutorConfig, QueryExecutor, QueryOutcome,
    RangeQuery, DEFAULT_TIMEOUT, QUERY_RANGE_PATH,
};
pub use natural::NaturalParser;
pub use result::{
    ApiResponse, InstantSample, Labels, Matrix, QueryData, RawResult, ResponseStatus,
    ResultValidator, Sample, Series, StringSample,
};
pub use step::{parse_step, StepCalculator, TARGET_POINTS};
pub use time::{GeneralParser, ResolvedTimes, TimeParser, TimeResolver, DEFAULT_LOOKBACK_SECS};
pub use types::{Diagnostic, Diagnostics, QueryRequest, TimeRange};
