//! Time resolution
//!
//! Turns the user-supplied start/end strings into absolute instants. Each
//! non-empty string is offered to an ordered list of [`TimeParser`]
//! strategies; the first one that accepts it wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::natural::NaturalParser;
use super::types::{Diagnostic, Diagnostics};
use crate::error::{PromalyError, Result, TimeField};

/// Lookback in seconds used when no start is given
pub const DEFAULT_LOOKBACK_SECS: i64 = 10 * 60;

/// A strategy that turns a string into an instant
pub trait TimeParser: Send + Sync {
    /// Short name used in error messages
    fn name(&self) -> &'static str;

    /// Parse `input`; `now` anchors relative expressions
    fn parse(&self, input: &str, now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, String>;
}

/// Absolute formats: Unix timestamps, RFC 3339/2822 and common date layouts
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralParser;

/// Layouts carrying their own offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M %z",
];

/// Naive layouts, interpreted as UTC
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%b %d, %Y", "%B %d, %Y"];

impl TimeParser for GeneralParser {
    fn name(&self) -> &'static str {
        "general"
    }

    fn parse(&self, input: &str, _now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, String> {
        let input = input.trim();

        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            return parse_digits(input);
        }

        if let Some(ts) = parse_decimal_seconds(input) {
            return Ok(ts);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        for format in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(input, format) {
                return Ok(dt.with_timezone(&Utc));
            }
        }

        for format in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                return Ok(naive.and_utc());
            }
        }

        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(input, format) {
                if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                    return Ok(naive.and_utc());
                }
            }
        }

        Err(format!("could not find format for {:?}", input))
    }
}

/// All-digit input: the length decides between a calendar layout and a
/// Unix timestamp of some precision.
fn parse_digits(input: &str) -> std::result::Result<DateTime<Utc>, String> {
    let out_of_range = || format!("timestamp {} out of range", input);
    let as_date = |format: &str| {
        NaiveDate::parse_from_str(input, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|n| n.and_utc())
            .ok_or_else(|| format!("{:?} is not a valid {} date", input, format))
    };

    match input.len() {
        4 => {
            let year: i32 = input.parse().map_err(|_| out_of_range())?;
            Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
                .single()
                .ok_or_else(out_of_range)
        }
        6 => {
            let year: i32 = input[..4].parse().map_err(|_| out_of_range())?;
            let month: u32 = input[4..].parse().map_err(|_| out_of_range())?;
            Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
                .single()
                .ok_or_else(|| format!("{:?} is not a valid year-month", input))
        }
        8 => as_date("%Y%m%d"),
        14 => NaiveDateTime::parse_from_str(input, "%Y%m%d%H%M%S")
            .map(|n| n.and_utc())
            .map_err(|e| format!("{:?}: {}", input, e)),
        13 => {
            let millis: i64 = input.parse().map_err(|_| out_of_range())?;
            Utc.timestamp_millis_opt(millis).single().ok_or_else(out_of_range)
        }
        16 => {
            let micros: i64 = input.parse().map_err(|_| out_of_range())?;
            Utc.timestamp_micros(micros).single().ok_or_else(out_of_range)
        }
        19 => {
            let nanos: i64 = input.parse().map_err(|_| out_of_range())?;
            Ok(Utc.timestamp_nanos(nanos))
        }
        n if n <= 10 => {
            let secs: i64 = input.parse().map_err(|_| out_of_range())?;
            Utc.timestamp_opt(secs, 0).single().ok_or_else(out_of_range)
        }
        n => Err(format!("unrecognized {}-digit timestamp {}", n, input)),
    }
}

/// `1700000000.25` style Unix seconds
fn parse_decimal_seconds(input: &str) -> Option<DateTime<Utc>> {
    let (whole, frac) = input.split_once('.')?;
    if whole.is_empty()
        || frac.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let secs: i64 = whole.parse().ok()?;
    // pad or truncate to nanosecond precision
    let mut digits: String = frac.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos: u32 = digits.parse().ok()?;

    Utc.timestamp_opt(secs, nanos).single()
}

/// Resolved start/end pair plus any non-fatal findings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimes {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub diagnostics: Diagnostics,
}

/// Ordered chain of time parsers
pub struct TimeResolver {
    parsers: Vec<Box<dyn TimeParser>>,
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeResolver {
    /// General parser first, natural-language parser second
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(GeneralParser), Box::new(NaturalParser)],
        }
    }

    /// Build a resolver with a custom strategy order
    pub fn with_parsers(parsers: Vec<Box<dyn TimeParser>>) -> Self {
        Self { parsers }
    }

    /// Append a strategy, tried after the existing ones
    pub fn push_parser(&mut self, parser: Box<dyn TimeParser>) {
        self.parsers.push(parser);
    }

    /// Names of the strategies in the order they are tried
    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// Resolve against the current wall-clock time
    pub fn resolve(&self, start: &str, end: &str) -> Result<ResolvedTimes> {
        self.resolve_at(start, end, Utc::now())
    }

    /// Resolve with an explicit reference time
    ///
    /// An empty `end` means `now`; an empty `start` means ten minutes before
    /// the resolved end. A start that is not strictly before end is reported
    /// as a diagnostic and kept as given.
    pub fn resolve_at(&self, start: &str, end: &str, now: DateTime<Utc>) -> Result<ResolvedTimes> {
        let end = if end.trim().is_empty() {
            now
        } else {
            self.parse_field(TimeField::End, end, now)?
        };

        let start = if start.trim().is_empty() {
            end.checked_sub_signed(chrono::Duration::seconds(DEFAULT_LOOKBACK_SECS))
                .ok_or_else(|| PromalyError::TimeParse {
                    field: TimeField::Start,
                    input: String::new(),
                    reason: format!(
                        "default lookback of {}s before {} is out of range",
                        DEFAULT_LOOKBACK_SECS,
                        end.to_rfc3339()
                    ),
                })?
        } else {
            self.parse_field(TimeField::Start, start, now)?
        };

        let mut diagnostics = Diagnostics::new();
        if start >= end {
            diagnostics.push(Diagnostic::InvertedRange { start, end });
        }

        Ok(ResolvedTimes {
            start,
            end,
            diagnostics,
        })
    }

    fn parse_field(&self, field: TimeField, input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut failures = Vec::with_capacity(self.parsers.len());

        for parser in &self.parsers {
            match parser.parse(input, now) {
                Ok(ts) => {
                    tracing::debug!(field = %field, parser = parser.name(), resolved = %ts, "Parsed time");
                    return Ok(ts);
                }
                Err(e) => failures.push(format!("{}: {}", parser.name(), e)),
            }
        }

        Err(PromalyError::TimeParse {
            field,
            input: input.to_string(),
            reason: if failures.is_empty() {
                "no time parsers configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    fn general(input: &str) -> std::result::Result<DateTime<Utc>, String> {
        GeneralParser.parse(input, reference())
    }

    #[test]
    fn test_general_unix_timestamps() {
        let expected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(general("1700000000").unwrap(), expected);
        assert_eq!(general("1700000000000").unwrap(), expected);
        assert_eq!(general("1700000000000000").unwrap(), expected);
        assert_eq!(general("1700000000000000000").unwrap(), expected);
        assert_eq!(
            general("1700000000.25").unwrap(),
            Utc.timestamp_millis_opt(1_700_000_000_250).unwrap()
        );
        assert!(general("17000000000000000000000").is_err());
    }

    #[test]
    fn test_general_calendar_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(general("2024-03-15T10:00:00Z").unwrap(), expected);
        assert_eq!(general("2024-03-15T12:00:00+02:00").unwrap(), expected);
        assert_eq!(general("2024-03-15 10:00:00").unwrap(), expected);
        assert_eq!(general("2024-03-15 10:00").unwrap(), expected);
        assert_eq!(general("2024/03/15 10:00:00").unwrap(), expected);
        assert_eq!(general("Fri, 15 Mar 2024 10:00:00 +0000").unwrap(), expected);

        let midnight = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(general("2024-03-15").unwrap(), midnight);
        assert_eq!(general("03/15/2024").unwrap(), midnight);
        assert_eq!(general("20240315").unwrap(), midnight);
        assert_eq!(general("15 Mar 2024").unwrap(), midnight);
    }

    #[test]
    fn test_general_rejects_relative() {
        assert!(general("1 hour ago").is_err());
        assert!(general("yesterday").is_err());
        assert!(general("").is_err());
    }

    #[test]
    fn test_empty_defaults() {
        let resolver = TimeResolver::new();
        let now = reference();

        let resolved = resolver.resolve_at("", "", now).unwrap();
        assert_eq!(resolved.end, now);
        assert_eq!(resolved.start, now - Duration::minutes(10));
        assert!(resolved.diagnostics.is_empty());
    }

    #[test]
    fn test_default_lookback_follows_explicit_end() {
        let resolver = TimeResolver::new();
        let resolved = resolver
            .resolve_at("", "2024-01-01T00:00:00Z", reference())
            .unwrap();
        assert_eq!(resolved.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            resolved.start,
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 50, 0).unwrap()
        );
    }

    /// Always answers with the earliest representable instant
    struct Earliest;

    impl TimeParser for Earliest {
        fn name(&self) -> &'static str {
            "earliest"
        }

        fn parse(&self, _input: &str, _now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, String> {
            Ok(DateTime::<Utc>::MIN_UTC)
        }
    }

    #[test]
    fn test_default_lookback_out_of_range() {
        let resolver = TimeResolver::with_parsers(vec![Box::new(Earliest)]);
        let err = resolver.resolve_at("", "the beginning", reference()).unwrap_err();
        assert!(matches!(
            err,
            PromalyError::TimeParse { field: TimeField::Start, .. }
        ));

        // an explicit start is still accepted
        let resolved = resolver.resolve_at("x", "the beginning", reference()).unwrap();
        assert_eq!(resolved.start, DateTime::<Utc>::MIN_UTC);
        assert!(resolved.diagnostics.has_inverted_range());
    }

    #[test]
    fn test_default_lookback_near_earliest_natural_end() {
        let resolver = TimeResolver::new();
        let err = resolver
            .resolve_at("", "8336311734540 seconds ago", reference())
            .unwrap_err();
        assert!(matches!(
            err,
            PromalyError::TimeParse { field: TimeField::Start, .. }
        ));
    }

    #[test]
    fn test_same_instant_any_strategy() {
        let resolver = TimeResolver::new();
        let now = reference();
        let one_hour_ago = now - Duration::hours(1);

        for input in [
            "1 hour ago",
            "2024-03-15T11:30:00Z",
            "2024-03-15 11:30:00",
            "1710502200",
            "1710502200000",
        ] {
            let resolved = resolver.resolve_at(input, "", now).unwrap();
            assert_eq!(resolved.start, one_hour_ago, "input {:?}", input);
        }
    }

    #[test]
    fn test_parse_error_names_field() {
        let resolver = TimeResolver::new();

        match resolver.resolve_at("", "not a time", reference()) {
            Err(PromalyError::TimeParse { field, input, reason }) => {
                assert_eq!(field, TimeField::End);
                assert_eq!(input, "not a time");
                assert!(reason.contains("general:"));
                assert!(reason.contains("natural:"));
            }
            other => panic!("expected TimeParse error, got {:?}", other),
        }

        match resolver.resolve_at("whenever", "", reference()) {
            Err(PromalyError::TimeParse { field, .. }) => assert_eq!(field, TimeField::Start),
            other => panic!("expected TimeParse error, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_range_is_kept() {
        let resolver = TimeResolver::new();
        let now = reference();

        let resolved = resolver.resolve_at("now", "1 hour ago", now).unwrap();
        assert_eq!(resolved.start, now);
        assert_eq!(resolved.end, now - Duration::hours(1));
        assert!(resolved.diagnostics.has_inverted_range());

        let resolved = resolver.resolve_at("now", "now", now).unwrap();
        assert_eq!(resolved.start, resolved.end);
        assert!(resolved.diagnostics.has_inverted_range());
    }

    struct Fixed(DateTime<Utc>);

    impl TimeParser for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn parse(&self, input: &str, _now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, String> {
            if input == "epoch" {
                Ok(self.0)
            } else {
                Err("not epoch".to_string())
            }
        }
    }

    #[test]
    fn test_parser_order_and_extension() {
        let mut resolver = TimeResolver::new();
        assert_eq!(resolver.parser_names(), vec!["general", "natural"]);

        resolver.push_parser(Box::new(Fixed(Utc.timestamp_opt(0, 0).unwrap())));
        assert_eq!(resolver.parser_names(), vec!["general", "natural", "fixed"]);

        let resolved = resolver.resolve_at("epoch", "", reference()).unwrap();
        assert_eq!(resolved.start, Utc.timestamp_opt(0, 0).unwrap());
    }

    #[test]
    fn test_empty_parser_chain() {
        let resolver = TimeResolver::with_parsers(Vec::new());
        let err = resolver.resolve_at("", "now", reference()).unwrap_err();
        assert!(err.to_string().contains("no time parsers configured"));
    }
}
