//! Calendar and time window models.
//!
//! Defines resource availability patterns: a daily working window on
//! working weekdays, shrunk by partial availability, minus blocked
//! periods (holidays, vacation, appointments).
//!
//! # Time Model
//! Instants are `NaiveDateTime` in the sprint's local wall clock.
//! Effort is consumed only inside working segments, so one work day of
//! effort spans exactly one daily window regardless of the 24h clock.
//!
//! # Precedence
//! Blocked periods override the daily window. An instant is working time
//! iff it falls inside the daily window of a working weekday AND does
//! NOT fall inside any blocked period.

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::WorkDuration;

/// A time interval [start, end).
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    /// Interval start (inclusive).
    pub start: NaiveDateTime,
    /// Interval end (exclusive).
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether an instant falls within this window.
    #[inline]
    pub fn contains(&self, time: NaiveDateTime) -> bool {
        time >= self.start && time < self.end
    }

    /// Whether two windows overlap. Empty windows overlap nothing.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end
            && other.start < self.end
    }

    /// The parts of `self` not covered by `other`.
    fn subtract(&self, other: &Self) -> Vec<TimeWindow> {
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut parts = Vec::with_capacity(2);
        if self.start < other.start {
            parts.push(TimeWindow::new(self.start, other.start));
        }
        if other.end < self.end {
            parts.push(TimeWindow::new(other.end, self.end));
        }
        parts
    }
}

/// Working-time calendar of a person or of the sprint as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkCalendar {
    /// Time of day the working window opens.
    pub day_start: NaiveTime,
    /// Length of a full working day in hours.
    pub hours_per_day: u32,
    /// Weekdays with a working window.
    pub working_days: Vec<Weekday>,
    /// Fraction of the working day actually available (0.0 to 1.0).
    pub availability: f64,
    /// Periods when no work happens (overrides the daily window).
    pub blocked_periods: Vec<TimeWindow>,
    /// How many days ahead searches look before giving up.
    pub search_days: u32,
}

impl WorkCalendar {
    /// Creates a full-availability Monday-to-Friday calendar.
    pub fn new(day_start: NaiveTime, hours_per_day: u32) -> Self {
        Self {
            day_start,
            hours_per_day,
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            availability: 1.0,
            blocked_periods: Vec::new(),
            search_days: 3660,
        }
    }

    /// Sets the working weekdays.
    pub fn with_working_days(mut self, days: Vec<Weekday>) -> Self {
        self.working_days = days;
        self
    }

    /// Sets partial availability (clamped to 0.0..=1.0).
    pub fn with_availability(mut self, availability: f64) -> Self {
        self.availability = if availability.is_nan() {
            0.0
        } else {
            availability.clamp(0.0, 1.0)
        };
        self
    }

    /// Adds a blocked period.
    pub fn with_blocked(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.blocked_periods.push(TimeWindow::new(start, end));
        self
    }

    /// Blocks whole days, `first` through `last` inclusive.
    pub fn with_blocked_days(self, first: NaiveDate, last: NaiveDate) -> Self {
        let start = first.and_time(NaiveTime::MIN);
        let end = last
            .checked_add_days(Days::new(1))
            .unwrap_or(last)
            .and_time(NaiveTime::MIN);
        self.with_blocked(start, end)
    }

    /// Sets the search horizon in days.
    pub fn with_search_days(mut self, days: u32) -> Self {
        self.search_days = days;
        self
    }

    /// Working minutes in one day after partial availability.
    pub fn daily_minutes(&self) -> i64 {
        let full = i64::from(self.hours_per_day) * 60;
        ((full as f64) * self.availability).round().clamp(0.0, full as f64) as i64
    }

    /// Working segments of a date, in time order.
    pub fn working_segments(&self, date: NaiveDate) -> Vec<TimeWindow> {
        let minutes = self.daily_minutes();
        if minutes == 0 || !self.working_days.contains(&date.weekday()) {
            return Vec::new();
        }

        let open = date.and_time(self.day_start);
        let day = TimeWindow::new(open, open + Duration::minutes(minutes));
        let mut segments = vec![day];
        for blocked in &self.blocked_periods {
            if !blocked.overlaps(&day) {
                continue;
            }
            segments = segments
                .into_iter()
                .flat_map(|segment| segment.subtract(blocked))
                .collect();
        }
        segments
    }

    /// Whether a date has any working time.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !self.working_segments(date).is_empty()
    }

    /// Whether an instant is within working time.
    pub fn is_working_time(&self, time: NaiveDateTime) -> bool {
        self.working_segments(time.date())
            .iter()
            .any(|segment| segment.contains(time))
    }

    /// Finds the next working instant at or after `from`.
    ///
    /// Returns `None` if no working time exists within the search horizon.
    pub fn next_working_time(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        for date in self.search_dates(from.date()) {
            for segment in self.working_segments(date) {
                if segment.end > from {
                    return Some(segment.start.max(from));
                }
            }
        }
        None
    }

    /// The instant at which `effort` started at `start` is finished.
    ///
    /// Zero effort finishes at `start` itself. Returns `None` if the
    /// calendar runs out of working time within the search horizon.
    pub fn add_work(&self, start: NaiveDateTime, effort: WorkDuration) -> Option<NaiveDateTime> {
        if effort.is_zero() {
            return Some(start);
        }

        let mut remaining = i64::try_from(effort.as_minutes()).ok()?;
        let mut cursor = start;
        for date in self.search_dates(start.date()) {
            for segment in self.working_segments(date) {
                if segment.end <= cursor {
                    continue;
                }
                let from = segment.start.max(cursor);
                let available = (segment.end - from).num_minutes();
                if remaining <= available {
                    return Some(from + Duration::minutes(remaining));
                }
                remaining -= available;
                cursor = segment.end;
            }
        }
        None
    }

    /// End of the last working segment reachable from `start` within the
    /// search horizon, or `start` if there is none.
    pub fn horizon_end(&self, start: NaiveDateTime) -> NaiveDateTime {
        self.search_dates(start.date())
            .flat_map(|date| self.working_segments(date))
            .filter(|segment| segment.end > start)
            .map(|segment| segment.end)
            .last()
            .unwrap_or(start)
    }

    fn search_dates(&self, first: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        (0..u64::from(self.search_days))
            .map_while(move |offset| first.checked_add_days(Days::new(offset)))
    }
}
