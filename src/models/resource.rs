//! Resource (assignee) model.
//!
//! A user is the resource a TASK is assigned to. Each user may carry
//! its own availability calendar (part-time, vacation); users without one
//! work on the sprint calendar.

use serde::{Deserialize, Serialize};

use super::WorkCalendar;

/// Identifier of a user (resource).
pub type UserId = u64;

/// A person that tasks can be assigned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Availability calendar. `None` = the sprint calendar.
    pub calendar: Option<WorkCalendar>,
}

impl User {
    /// Creates a user without a personal calendar.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            calendar: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the availability calendar.
    pub fn with_calendar(mut self, calendar: WorkCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// The calendar this user works on.
    pub fn calendar_or<'a>(&'a self, sprint_calendar: &'a WorkCalendar) -> &'a WorkCalendar {
        self.calendar.as_ref().unwrap_or(sprint_calendar)
    }
}
