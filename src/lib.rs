//! # Promaly
//!
//! Fetches a time-series range from a Prometheus-compatible HTTP API and
//! renders it as a text artifact.
//!
//! ## Pipeline
//!
//! `resolve time → compute step → build client → execute (bounded) → validate shape`
//!
//! Each stage completes or the whole invocation fails. The only non-fatal
//! condition, an inverted time range, is reported on a diagnostic channel.
//!
//! ## Modules
//!
//! - [`query`]: Time resolution, step derivation, authentication and the bounded range query
//! - [`render`]: CSV / JSON / NDJSON / table output
//! - [`config`]: TOML configuration with environment overrides
//! - [`error`]: Error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use promaly::{query_range, render, ExecutorConfig, OutputFormat, RangeQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let outcome = query_range(&ExecutorConfig::default(), &RangeQuery::default()).await?;
//!
//!     let table = render(&outcome.matrix, "Targets up", OutputFormat::Table)?;
//!     print!("{}", String::from_utf8_lossy(&table));
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod query;
pub mod render;

// Re-export top-level types for convenience
pub use error::{ExecutionCause, PromalyError, Result, TimeField};

pub use query::{
    query_range, query_range_at, Credentials, Diagnostic, Diagnostics, ExecutorConfig, Matrix,
    QueryData, QueryExecutor, QueryOutcome, RangeQuery, Sample, Series, TimeRange, TimeResolver,
};

pub use render::{render, write_output, OutputFormat, OutputTarget};

pub use config::{Config, ConfigError, LoggingConfig};
