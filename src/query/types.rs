//! Core types for the range-query pipeline
//!
//! - `TimeRange`: resolved bounds plus sampling step
//! - `QueryRequest`: expression bound to a range, built once per call
//! - `Diagnostic`: non-fatal conditions reported alongside a result

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Resolved query window
///
/// Unlike a storage range, `start < end` is not enforced here: inverted or
/// empty windows are reported as a [`Diagnostic::InvertedRange`] and sent to
/// the server unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Sampling interval; zero until the step has been resolved
    pub step: Duration,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Self {
        Self { start, end, step }
    }

    /// Length of the window in milliseconds (negative when inverted)
    pub fn duration_millis(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// Whether start is strictly before end
    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} .. {}] step {:?}",
            self.start.to_rfc3339(),
            self.end.to_rfc3339(),
            self.step
        )
    }
}

/// A range query ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// PromQL expression, passed through as-is
    pub expression: String,
    pub range: TimeRange,
}

impl QueryRequest {
    pub fn new(expression: impl Into<String>, range: TimeRange) -> Self {
        Self {
            expression: expression.into(),
            range,
        }
    }

    /// Wire parameters for `/api/v1/query_range`
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.expression.clone()),
            ("start", format_timestamp(self.range.start)),
            ("end", format_timestamp(self.range.end)),
            ("step", format_seconds(self.range.step)),
        ]
    }
}

/// Unix seconds, with a fractional part (down to nanoseconds) only when needed
fn format_timestamp(ts: DateTime<Utc>) -> String {
    let secs = ts.timestamp();
    let nanos = ts.timestamp_subsec_nanos();
    if nanos == 0 {
        return secs.to_string();
    }

    // subsec nanos count forward from the floor second
    let (sign, whole, frac) = if secs >= 0 {
        ("", secs.unsigned_abs(), nanos)
    } else {
        ("-", (secs + 1).unsigned_abs(), 1_000_000_000 - nanos)
    };
    let frac = format!("{:09}", frac);
    format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
}

fn format_seconds(step: Duration) -> String {
    if step.subsec_nanos() == 0 {
        step.as_secs().to_string()
    } else {
        format!("{}", step.as_secs_f64())
    }
}

/// Non-fatal condition observed while running a query
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// start is not strictly before end; the bounds were used as given
    InvertedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Warning string carried in the server response
    ServerWarning(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::InvertedRange { start, end } => write!(
                f,
                "start time {} is not before end time {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            Diagnostic::ServerWarning(msg) => write!(f, "server warning: {}", msg),
        }
    }
}

/// Collector for diagnostics; each entry is logged as it is recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::InvertedRange { .. } => tracing::warn!("{}", diagnostic),
            Diagnostic::ServerWarning(_) => tracing::debug!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn has_inverted_range(&self) -> bool {
        self.entries
            .iter()
            .any(|d| matches!(d, Diagnostic::InvertedRange { .. }))
    }
}
