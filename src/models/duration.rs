//! Work-day durations.
//!
//! Effort is counted in working minutes, not wall-clock time. A "day" in
//! the text grammar is a configured number of working hours (default 8),
//! so `1d` and `8h` are the same effort under the default format.
//!
//! # Grammar
//!
//! ```text
//! duration := [ <n>d ] [ <n>h ] [ <n>m ]      (at least one token)
//! ```
//!
//! Tokens are separated by whitespace and must appear in d, h, m order,
//! each at most once. The canonical form omits zero parts and renders an
//! empty effort as `0m`.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// An effort quantity in working minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkDuration(u64);

impl WorkDuration {
    /// No effort.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from working minutes.
    pub const fn from_minutes(minutes: u64) -> Self {
        Self(minutes)
    }

    /// Creates a duration from working hours.
    pub const fn from_hours(hours: u64) -> Self {
        Self(hours * 60)
    }

    /// Working minutes.
    #[inline]
    pub fn as_minutes(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for WorkDuration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for WorkDuration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for WorkDuration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a WorkDuration> for WorkDuration {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Why a duration string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationErrorKind {
    #[error("value is empty")]
    Empty,
    #[error("token '{0}' has an unknown unit (expected d, h or m)")]
    UnknownUnit(String),
    #[error("token '{0}' has a missing or invalid number")]
    InvalidNumber(String),
    #[error("token '{0}' repeats a unit or breaks d/h/m order")]
    OutOfOrder(String),
    #[error("value is too large")]
    Overflow,
}

/// A rejected duration string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{input}' is not a valid work duration: {kind}")]
pub struct DurationParseError {
    /// The text as given.
    pub input: String,
    pub kind: DurationErrorKind,
}

impl DurationParseError {
    fn new(input: &str, kind: DurationErrorKind) -> Self {
        Self {
            input: input.to_string(),
            kind,
        }
    }
}

/// Parser and formatter for the work-day grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDayFormat {
    hours_per_day: u32,
}

impl WorkDayFormat {
    /// Creates a format where one day equals `hours_per_day` working hours.
    ///
    /// A zero value is treated as one hour so that `d` stays meaningful.
    pub fn new(hours_per_day: u32) -> Self {
        Self {
            hours_per_day: hours_per_day.max(1),
        }
    }

    pub fn hours_per_day(&self) -> u32 {
        self.hours_per_day
    }

    fn minutes_per_day(&self) -> u64 {
        u64::from(self.hours_per_day) * 60
    }

    /// Parses `"1d 2h 30m"`-style text.
    pub fn parse(&self, text: &str) -> Result<WorkDuration, DurationParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DurationParseError::new(text, DurationErrorKind::Empty));
        }

        let mut total: u64 = 0;
        let mut last_rank: Option<u8> = None;

        for token in trimmed.split_whitespace() {
            let Some(unit) = token.chars().last() else {
                continue;
            };
            let (rank, unit_minutes) = match unit {
                'd' => (0u8, self.minutes_per_day()),
                'h' => (1, 60),
                'm' => (2, 1),
                _ => {
                    return Err(DurationParseError::new(
                        text,
                        DurationErrorKind::UnknownUnit(token.to_string()),
                    ))
                }
            };

            let digits = &token[..token.len() - unit.len_utf8()];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DurationParseError::new(
                    text,
                    DurationErrorKind::InvalidNumber(token.to_string()),
                ));
            }

            if last_rank.is_some_and(|prev| rank <= prev) {
                return Err(DurationParseError::new(
                    text,
                    DurationErrorKind::OutOfOrder(token.to_string()),
                ));
            }
            last_rank = Some(rank);

            let value: u64 = digits
                .parse()
                .map_err(|_| DurationParseError::new(text, DurationErrorKind::Overflow))?;
            total = value
                .checked_mul(unit_minutes)
                .and_then(|m| total.checked_add(m))
                .ok_or_else(|| DurationParseError::new(text, DurationErrorKind::Overflow))?;
        }

        Ok(WorkDuration(total))
    }

    /// Renders the canonical form.
    pub fn format(&self, duration: WorkDuration) -> String {
        if duration.is_zero() {
            return "0m".to_string();
        }

        let per_day = self.minutes_per_day();
        let days = duration.0 / per_day;
        let hours = (duration.0 % per_day) / 60;
        let minutes = duration.0 % 60;

        let mut parts = Vec::with_capacity(3);
        if days > 0 {
            parts.push(format!("{days}d"));
        }
        if hours > 0 {
            parts.push(format!("{hours}h"));
        }
        if minutes > 0 {
            parts.push(format!("{minutes}m"));
        }
        parts.join(" ")
    }
}

impl Default for WorkDayFormat {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_form() {
        let f = WorkDayFormat::default();
        let d = f.parse("1d 2h 30m").unwrap();
        assert_eq!(d.as_minutes(), 8 * 60 + 2 * 60 + 30);
    }

    #[test]
    fn test_round_trip_canonical() {
        let f = WorkDayFormat::default();
        for text in ["1d 2h 30m", "3d", "5h", "45m", "2d 15m", "0m"] {
            assert_eq!(f.format(f.parse(text).unwrap()), text);
        }
    }

    #[test]
    fn test_day_length_follows_config() {
        let f = WorkDayFormat::new(6);
        assert_eq!(f.parse("1d").unwrap(), WorkDuration::from_hours(6));
        assert_eq!(f.format(WorkDuration::from_hours(8)), "1d 2h");
    }

    #[test]
    fn test_format_normalises_overflowing_units() {
        let f = WorkDayFormat::default();
        let d = f.parse("10h 90m").unwrap();
        assert_eq!(f.format(d), "1d 3h 30m");
    }

    #[test]
    fn test_rejects_malformed() {
        let f = WorkDayFormat::default();
        let cases = [
            ("", DurationErrorKind::Empty),
            ("   ", DurationErrorKind::Empty),
            ("3x", DurationErrorKind::UnknownUnit("3x".into())),
            ("h", DurationErrorKind::InvalidNumber("h".into())),
            ("-2h", DurationErrorKind::InvalidNumber("-2h".into())),
            ("1.5h", DurationErrorKind::InvalidNumber("1.5h".into())),
            ("2h 1d", DurationErrorKind::OutOfOrder("1d".into())),
            ("2h 3h", DurationErrorKind::OutOfOrder("3h".into())),
            ("12", DurationErrorKind::UnknownUnit("12".into())),
        ];
        for (text, kind) in cases {
            let err = f.parse(text).unwrap_err();
            assert_eq!(err.kind, kind, "input {text:?}");
            assert_eq!(err.input, text);
        }
    }

    #[test]
    fn test_rejects_overflow() {
        let f = WorkDayFormat::default();
        let err = f.parse("99999999999999999999d").unwrap_err();
        assert_eq!(err.kind, DurationErrorKind::Overflow);
    }

    #[test]
    fn test_sum_saturates() {
        let total: WorkDuration = [WorkDuration::from_hours(2), WorkDuration::from_minutes(30)]
            .iter()
            .sum();
        assert_eq!(total.as_minutes(), 150);
        assert_eq!(
            WorkDuration::from_minutes(u64::MAX) + WorkDuration::from_minutes(1),
            WorkDuration::from_minutes(u64::MAX)
        );
    }
}
