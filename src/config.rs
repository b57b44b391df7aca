//! Scheduling configuration.
//!
//! Values are loaded from TOML by the embedding application; every field
//! has a default so an empty document yields the standard 8-hour,
//! Monday-to-Friday week.
//!
//! ```
//! use sprint_schedule::config::SchedulingConfig;
//!
//! let config = SchedulingConfig::from_toml_str("work_day_hours = 6").unwrap();
//! assert_eq!(config.work_day_hours, 6);
//! ```

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::models::{WorkCalendar, WorkDayFormat};

/// Work-week and calendar settings shared by the scheduler and leveler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Working hours in one work day (the `d` unit).
    pub work_day_hours: u32,
    /// Time of day the working window opens.
    pub day_start: NaiveTime,
    /// Weekdays with a working window.
    pub working_days: Vec<Weekday>,
    /// How far calendar searches look ahead before giving up.
    pub calendar_search_days: u32,
}

impl SchedulingConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the work day length.
    pub fn with_work_day_hours(mut self, hours: u32) -> Self {
        self.work_day_hours = hours;
        self
    }

    /// Sets the daily window start.
    pub fn with_day_start(mut self, day_start: NaiveTime) -> Self {
        self.day_start = day_start;
        self
    }

    /// Sets the working weekdays.
    pub fn with_working_days(mut self, days: Vec<Weekday>) -> Self {
        self.working_days = days;
        self
    }

    /// Checks that the daily window fits inside one calendar day and the
    /// week has at least one working day.
    pub fn validate(&self) -> Result<()> {
        if !(1..=24).contains(&self.work_day_hours) {
            return Err(ScheduleError::Config(format!(
                "work_day_hours must be between 1 and 24, got {}",
                self.work_day_hours
            )));
        }
        let window_end_secs = u64::from(self.day_start.num_seconds_from_midnight())
            + u64::from(self.work_day_hours) * 3600;
        if window_end_secs > 24 * 3600 {
            return Err(ScheduleError::Config(format!(
                "a {}h day starting at {} runs past midnight",
                self.work_day_hours, self.day_start
            )));
        }
        if self.working_days.is_empty() {
            return Err(ScheduleError::Config(
                "working_days must name at least one weekday".to_string(),
            ));
        }
        if self.calendar_search_days == 0 {
            return Err(ScheduleError::Config(
                "calendar_search_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Duration grammar matching this work day.
    pub fn duration_format(&self) -> WorkDayFormat {
        WorkDayFormat::new(self.work_day_hours)
    }

    /// Full-availability calendar for this work week.
    pub fn base_calendar(&self) -> WorkCalendar {
        WorkCalendar::new(self.day_start, self.work_day_hours)
            .with_working_days(self.working_days.clone())
            .with_search_days(self.calendar_search_days)
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            work_day_hours: 8,
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            calendar_search_days: 3660,
        }
    }
}
