//! Natural-language time expressions
//!
//! Relative phrases resolved against a reference instant.
//!
//! # Supported Syntax
//!
//! ```text
//! now | today | yesterday | tomorrow
//! <n> <unit> ago        e.g. "1 hour ago", "90m ago", "an hour ago"
//! in <n> <unit>         e.g. "in 2 days"
//! last <unit>           e.g. "last week"
//! next <unit>           e.g. "next month"
//! ```
//!
//! Seconds through weeks are fixed-length; months and years use calendar
//! arithmetic. Day words snap to midnight UTC.

use chrono::{DateTime, Duration, Months, Utc};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, multispace0, multispace1},
    combinator::{all_consuming, map, map_res, value},
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::time::TimeParser;

/// Calendar unit in a relative expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Parsed expression, not yet anchored to a reference time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expr {
    Now,
    Today,
    Yesterday,
    Tomorrow,
    /// Signed number of units relative to now
    Offset { amount: i64, unit: Unit },
}

/// Second-stage parser for phrases like "1 hour ago" or "yesterday"
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalParser;

impl TimeParser for NaturalParser {
    fn name(&self) -> &'static str {
        "natural"
    }

    fn parse(&self, input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        let normalized = input.trim().to_lowercase();

        let expr = match all_consuming(parse_expr)(normalized.as_str()) {
            Ok((_, expr)) => expr,
            Err(_) => return Err(format!("unrecognized expression {:?}", input.trim())),
        };

        anchor(expr, now).ok_or_else(|| format!("{:?} is out of range", input.trim()))
    }
}

fn anchor(expr: Expr, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();

    match expr {
        Expr::Now => Some(now),
        Expr::Today => Some(midnight),
        Expr::Yesterday => midnight.checked_sub_signed(Duration::days(1)),
        Expr::Tomorrow => midnight.checked_add_signed(Duration::days(1)),
        Expr::Offset { amount, unit } => shift(now, amount, unit),
    }
}

fn shift(now: DateTime<Utc>, amount: i64, unit: Unit) -> Option<DateTime<Utc>> {
    let fixed = match unit {
        Unit::Second => Duration::try_seconds(amount),
        Unit::Minute => Duration::try_minutes(amount),
        Unit::Hour => Duration::try_hours(amount),
        Unit::Day => Duration::try_days(amount),
        Unit::Week => Duration::try_weeks(amount),
        Unit::Month | Unit::Year => None,
    };

    if let Some(delta) = fixed {
        return now.checked_add_signed(delta);
    }

    let months = match unit {
        Unit::Month => amount.unsigned_abs(),
        Unit::Year => amount.unsigned_abs().checked_mul(12)?,
        // fixed-length unit whose Duration overflowed
        _ => return None,
    };
    let months = Months::new(u32::try_from(months).ok()?);

    if amount < 0 {
        now.checked_sub_months(months)
    } else {
        now.checked_add_months(months)
    }
}

fn parse_expr(input: &str) -> IResult<&str, Expr> {
    alt((parse_ago, parse_in, parse_last_next, parse_keyword))(input)
}

/// now | today | yesterday | tomorrow
fn parse_keyword(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::Now, tag("now")),
        value(Expr::Today, tag("today")),
        value(Expr::Yesterday, tag("yesterday")),
        value(Expr::Tomorrow, tag("tomorrow")),
    ))(input)
}

/// <n> <unit> ago
fn parse_ago(input: &str) -> IResult<&str, Expr> {
    map(
        terminated(
            separated_pair(parse_amount, multispace0, parse_unit),
            preceded(multispace1, tag("ago")),
        ),
        |(amount, unit)| Expr::Offset {
            amount: -amount,
            unit,
        },
    )(input)
}

/// in <n> <unit>
fn parse_in(input: &str) -> IResult<&str, Expr> {
    map(
        preceded(
            tuple((tag("in"), multispace1)),
            separated_pair(parse_amount, multispace0, parse_unit),
        ),
        |(amount, unit)| Expr::Offset { amount, unit },
    )(input)
}

/// last <unit> | next <unit>
fn parse_last_next(input: &str) -> IResult<&str, Expr> {
    map(
        separated_pair(
            alt((value(-1i64, tag("last")), value(1i64, tag("next")))),
            multispace1,
            parse_unit,
        ),
        |(amount, unit)| Expr::Offset { amount, unit },
    )(input)
}

fn parse_amount(input: &str) -> IResult<&str, i64> {
    alt((
        map_res(digit1, |s: &str| s.parse::<i64>()),
        value(1, tag("an")),
        value(1, tag("a")),
    ))(input)
}

/// Longest spellings first: alt commits to the first tag that matches.
fn parse_unit(input: &str) -> IResult<&str, Unit> {
    alt((
        value(
            Unit::Month,
            alt((tag("months"), tag("month"), tag("mos"), tag("mo"))),
        ),
        value(
            Unit::Minute,
            alt((tag("minutes"), tag("minute"), tag("mins"), tag("min"), tag("m"))),
        ),
        value(
            Unit::Second,
            alt((tag("seconds"), tag("second"), tag("secs"), tag("sec"), tag("s"))),
        ),
        value(
            Unit::Hour,
            alt((tag("hours"), tag("hour"), tag("hrs"), tag("hr"), tag("h"))),
        ),
        value(Unit::Day, alt((tag("days"), tag("day"), tag("d")))),
        value(
            Unit::Week,
            alt((tag("weeks"), tag("week"), tag("wks"), tag("wk"), tag("w"))),
        ),
        value(
            Unit::Year,
            alt((tag("years"), tag("year"), tag("yrs"), tag("yr"), tag("y"))),
        ),
    ))(input)
}
