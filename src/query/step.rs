//! Step resolution
//!
//! A zero step means "pick one for me": the window is divided into roughly
//! [`TARGET_POINTS`] samples, never finer than one second.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{all_consuming, opt, recognize, value},
    multi::many1,
    sequence::{pair, preceded},
    IResult,
};
use std::time::Duration;

use super::types::TimeRange;
use crate::error::{PromalyError, Result};

/// Number of samples an auto-resolved step aims for
pub const TARGET_POINTS: i64 = 250;

/// Derives the sampling interval for a range
#[derive(Debug, Clone, Copy, Default)]
pub struct StepCalculator;

impl StepCalculator {
    /// Return `range` with its step filled in
    ///
    /// A non-zero step is kept verbatim.
    pub fn resolve(&self, mut range: TimeRange) -> TimeRange {
        if range.step.is_zero() {
            range.step = Self::auto_step(range.duration_millis());
            tracing::debug!(step = ?range.step, "Auto-resolved query step");
        }
        range
    }

    /// `max(floor(seconds / 250), 1)` seconds
    pub fn auto_step(duration_millis: i64) -> Duration {
        let resolution = duration_millis.div_euclid(TARGET_POINTS * 1000).max(1);
        Duration::from_secs(resolution as u64)
    }
}

/// Parse a duration such as `1m`, `30s`, `1h30m`, `1.5h` or `0`
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
pub fn parse_step(input: &str) -> Result<Duration> {
    let input = input.trim();
    let invalid = || PromalyError::Config(format!("invalid step duration {:?}", input));

    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let (_, parts) = all_consuming(many1(duration_part))(input).map_err(|_| invalid())?;

    let mut nanos: f64 = 0.0;
    for (amount, unit_nanos) in parts {
        let amount: f64 = amount.parse().map_err(|_| invalid())?;
        nanos += amount * unit_nanos;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn duration_part(input: &str) -> IResult<&str, (&str, f64)> {
    pair(
        recognize(pair(digit1, opt(preceded(tag("."), digit1)))),
        duration_unit,
    )(input)
}

/// Unit length in nanoseconds; `ms` must be tried before `m`
fn duration_unit(input: &str) -> IResult<&str, f64> {
    alt((
        value(1.0, tag("ns")),
        value(1e3, alt((tag("us"), tag("µs")))),
        value(1e6, tag("ms")),
        value(1e9, tag("s")),
        value(60e9, tag("m")),
        value(3600e9, tag("h")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn range(seconds: f64, step: Duration) -> TimeRange {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let end = start + chrono::Duration::milliseconds((seconds * 1000.0) as i64);
        TimeRange::new(start, end, step)
    }

    #[test]
    fn test_auto_step() {
        let calc = StepCalculator;
        assert_eq!(calc.resolve(range(250.0, Duration::ZERO)).step, Duration::from_secs(1));
        assert_eq!(calc.resolve(range(25_000.0, Duration::ZERO)).step, Duration::from_secs(100));
        assert_eq!(calc.resolve(range(0.5, Duration::ZERO)).step, Duration::from_secs(1));
        assert_eq!(calc.resolve(range(600.0, Duration::ZERO)).step, Duration::from_secs(2));
        assert_eq!(calc.resolve(range(3600.0, Duration::ZERO)).step, Duration::from_secs(14));
    }

    #[test]
    fn test_auto_step_inverted_range() {
        let calc = StepCalculator;
        assert_eq!(calc.resolve(range(-600.0, Duration::ZERO)).step, Duration::from_secs(1));
        assert_eq!(calc.resolve(range(0.0, Duration::ZERO)).step, Duration::from_secs(1));
    }

    #[test]
    fn test_explicit_step_kept() {
        let calc = StepCalculator;
        let step = Duration::from_secs(60);
        let resolved = calc.resolve(range(25_000.0, step));
        assert_eq!(resolved.step, step);
        assert_eq!(resolved.start, range(25_000.0, step).start);
    }

    #[test]
    fn test_parse_step() {
        assert_eq!(parse_step("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_step("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_step("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_step("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_step("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_step("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_step("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_step(" 15s ").unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_step_invalid() {
        assert!(parse_step("").is_err());
        assert!(parse_step("1").is_err());
        assert!(parse_step("1d").is_err());
        assert!(parse_step("-1m").is_err());
        assert!(parse_step("m").is_err());
        assert!(matches!(parse_step("abc"), Err(PromalyError::Config(_))));
    }
}
