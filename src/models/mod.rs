//! Sprint scheduling domain models.
//!
//! Provides the value types the scheduling core works on. Persistence
//! collaborators hand these in and read them back out; nothing here
//! knows about graphs or passes.

mod calendar;
mod duration;
mod resource;
mod task;
mod worklog;

pub use calendar::{TimeWindow, WorkCalendar};
pub use duration::{DurationErrorKind, DurationParseError, WorkDayFormat, WorkDuration};
pub use resource::{User, UserId};
pub use task::{Relation, TaskId, TaskKind, TaskNode};
pub use worklog::Worklog;
