//! Time expressions and the query time window.
//!
//! A time expression is what the user types for `--begin-at` / `--end-at`:
//!
//! - `now` - the wall-clock instant at parse time
//! - `start` - no bound (beginning of retention)
//! - `+N` / `-N` - `N` seconds after/before now
//! - anything else - an absolute timestamp (RFC 3339, `YYYY-MM-DD HH:MM:SS`,
//!   `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`; naive forms are UTC)
//!
//! The CloudWatch Logs API speaks epoch milliseconds. [`to_wire_millis`] and
//! [`from_wire_millis`] are the only conversions between the two worlds.

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use super::error::ConfigError;

/// Padding added to the wire end time. Events near the boundary can be
/// indexed slightly late, so the request window is widened and the exact
/// exclusive bound is re-applied locally.
pub const END_TIME_PADDING_MS: i64 = 10_000;

/// Convert an instant to epoch milliseconds (floor).
pub fn to_wire_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Convert epoch milliseconds to an instant. `None` if out of chrono's range.
pub fn from_wire_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// A parsed, not yet resolved, time expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExpression {
    Now,
    Start,
    /// Seconds relative to now (negative is in the past)
    Relative(i64),
    Absolute(DateTime<Utc>),
}

fn relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]\d+$").expect("relative time pattern is valid"))
}

impl TimeExpression {
    /// Parse a time expression without resolving it against a clock.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.trim();

        match trimmed {
            "now" => return Ok(Self::Now),
            "start" => return Ok(Self::Start),
            _ => {}
        }

        if relative_pattern().is_match(trimmed) {
            let seconds = trimmed
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidTime(input.to_string()))?;
            return Ok(Self::Relative(seconds));
        }

        parse_absolute(trimmed)
            .map(Self::Absolute)
            .ok_or_else(|| ConfigError::InvalidTime(input.to_string()))
    }

    /// Resolve against `now`. `Start` resolves to no bound.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ConfigError> {
        match self {
            Self::Now => Ok(Some(now)),
            Self::Start => Ok(None),
            Self::Relative(seconds) => Duration::try_seconds(seconds)
                .and_then(|offset| now.checked_add_signed(offset))
                .map(Some)
                .ok_or_else(|| ConfigError::InvalidTime(format!("{:+}", seconds))),
            Self::Absolute(instant) => Ok(Some(instant)),
        }
    }
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse and resolve a time expression in one go.
pub fn parse_time(input: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ConfigError> {
    TimeExpression::parse(input)?.resolve(now)
}

/// Optional start and end instants. `end` is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, ConfigError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(ConfigError::EmptyWindow { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// Window with no bounds at all.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True when the window has no end, i.e. only cancellation stops a follow run.
    pub fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }

    /// True if `timestamp` is at or past the exclusive end bound.
    pub fn is_past_end(&self, timestamp: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| timestamp >= end)
    }

    /// Wire start for `GetLogEvents`.
    pub fn wire_start(&self) -> Option<i64> {
        self.start.map(to_wire_millis)
    }

    /// Wire end for `GetLogEvents`, padded by [`END_TIME_PADDING_MS`].
    pub fn wire_end(&self) -> Option<i64> {
        self.end
            .map(|end| to_wire_millis(end).saturating_add(END_TIME_PADDING_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_time("now", fixed_now()).unwrap(), Some(fixed_now()));
        assert_eq!(parse_time("start", fixed_now()).unwrap(), None);
    }

    #[test]
    fn test_relative_offsets() {
        let now = fixed_now();
        assert_eq!(
            parse_time("-60", now).unwrap(),
            Some(now - Duration::seconds(60))
        );
        assert_eq!(
            parse_time("+3600", now).unwrap(),
            Some(now + Duration::hours(1))
        );
    }

    #[test]
    fn test_absolute_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        for input in [
            "2024-01-02T03:04:05Z",
            "2024-01-02T05:04:05+02:00",
            "2024-01-02 03:04:05",
            "2024-01-02T03:04:05",
        ] {
            assert_eq!(parse_time(input, fixed_now()).unwrap(), Some(expected), "{}", input);
        }

        assert_eq!(
            parse_time("2024-01-02", fixed_now()).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_garbage_is_config_error() {
        for input in ["yesterday", "60", "--5", "+", "2024-13-40"] {
            assert!(
                matches!(parse_time(input, fixed_now()), Err(ConfigError::InvalidTime(_))),
                "{} should not parse",
                input
            );
        }
    }

    #[test]
    fn test_now_survives_wire_round_trip() {
        let now = Utc::now();
        let parsed = parse_time("now", now).unwrap().unwrap();
        let back = from_wire_millis(to_wire_millis(parsed)).unwrap();
        assert_eq!(back.timestamp(), parsed.timestamp());
        assert!(parsed - back < Duration::milliseconds(1));
    }

    #[test]
    fn test_wire_millis_exact() {
        for millis in [0_i64, 1, 1_709_294_400_123, -1_500] {
            assert_eq!(to_wire_millis(from_wire_millis(millis).unwrap()), millis);
        }
    }

    #[test]
    fn test_window_end_is_exclusive_and_padded() {
        let start = from_wire_millis(0).unwrap();
        let end = from_wire_millis(20).unwrap();
        let window = TimeWindow::new(Some(start), Some(end)).unwrap();

        assert!(!window.is_past_end(from_wire_millis(19).unwrap()));
        assert!(window.is_past_end(from_wire_millis(20).unwrap()));
        assert_eq!(window.wire_start(), Some(0));
        assert_eq!(window.wire_end(), Some(10_020));
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let a = fixed_now();
        let b = a - Duration::minutes(1);
        assert!(matches!(
            TimeWindow::new(Some(a), Some(b)),
            Err(ConfigError::EmptyWindow { .. })
        ));
        assert!(TimeWindow::new(None, Some(a)).is_ok());
        assert!(TimeWindow::unbounded().is_open_ended());
    }
}
