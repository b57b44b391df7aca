//! Worklog model.
//!
//! Logged effort is external data; the sprint only sums it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{TaskId, WorkDuration};

/// Effort a user logged against a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worklog {
    pub task_id: TaskId,
    /// When the work was done.
    pub logged_at: NaiveDateTime,
    pub time_spent: WorkDuration,
}

impl Worklog {
    pub fn new(task_id: TaskId, logged_at: NaiveDateTime, time_spent: WorkDuration) -> Self {
        Self {
            task_id,
            logged_at,
            time_spent,
        }
    }
}
