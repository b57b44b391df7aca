//! Resource leveling.
//!
//! The scheduler produces dependency-feasible dates that ignore finite
//! capacity. The leveler walks tasks in scheduling order and pushes a
//! task forward past any earlier-visited task already occupying the same
//! resource, respecting that resource's calendar. It only ever moves
//! dates later.
//!
//! Tasks that cannot be leveled are recorded in an [`ErrorCollector`]
//! and processing continues; the sprint keeps a best-effort schedule.
//!
//! # Usage
//!
//! ```
//! use chrono::NaiveDate;
//! use sprint_schedule::config::SchedulingConfig;
//! use sprint_schedule::leveling::{level_resources, LevelingContext, LevelingErrors};
//! use sprint_schedule::models::{TaskNode, User, WorkDuration};
//! use sprint_schedule::sprint::{Sprint, SprintHeader};
//!
//! let as_of = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! let mut sprint = Sprint::new(SprintHeader::new(1), SchedulingConfig::default());
//! sprint.initialize().unwrap();
//! sprint.init_user_map(vec![User::new(5)]).unwrap();
//! sprint
//!     .init_task_map(
//!         vec![
//!             TaskNode::task(1).with_order(0).with_estimate(WorkDuration::from_hours(8)).with_resource(5),
//!             TaskNode::task(2).with_order(1).with_estimate(WorkDuration::from_hours(8)).with_resource(5),
//!         ],
//!         vec![],
//!     )
//!     .unwrap();
//! sprint.recalculate(as_of).unwrap();
//!
//! let mut errors = LevelingErrors::new();
//! level_resources(&mut errors, &mut sprint, &LevelingContext::new(), as_of).unwrap();
//! assert!(errors.is_empty());
//! assert!(sprint.task(2).unwrap().start >= sprint.task(1).unwrap().end);
//! ```
//!
//! # References
//!
//! - Kolisch (1996), "Serial and parallel resource-constrained project
//!   scheduling methods revisited", EJOR 90(2)
//! - Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

mod context;
mod leveler;

pub use context::LevelingContext;
pub use leveler::{LevelingPlan, ResourceLeveler};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TaskId;
use crate::sprint::Sprint;

/// Receives per-task leveling problems.
///
/// Recording never aborts the pass.
pub trait ErrorCollector {
    /// Records a problem with `task_id`.
    fn record(&mut self, task_id: TaskId, message: String);
}

/// Default collector: an ordered list of `(task_id, message)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelingErrors {
    entries: Vec<(TaskId, String)>,
}

impl LevelingErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TaskId, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages recorded for one task.
    pub fn for_task(&self, task_id: TaskId) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(id, _)| *id == task_id)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn into_vec(self) -> Vec<(TaskId, String)> {
        self.entries
    }
}

impl ErrorCollector for LevelingErrors {
    fn record(&mut self, task_id: TaskId, message: String) {
        self.entries.push((task_id, message));
    }
}

/// Summary of a committed leveling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelingReport {
    /// Leaves visited.
    pub visited: usize,
    /// Tasks whose start moved later, in visiting order.
    pub delayed: Vec<TaskId>,
}

/// Levels `sprint` against its users' calendars.
///
/// The sprint is recalculated first unless it is already calculated for
/// `as_of`.
///
/// # Errors
/// `Lifecycle` before tasks are loaded, `Integrity` from the forward
/// pass, `Cancelled` if the context is cancelled (nothing is committed).
pub fn level_resources(
    errors: &mut dyn ErrorCollector,
    sprint: &mut Sprint,
    context: &LevelingContext,
    as_of: NaiveDateTime,
) -> Result<LevelingReport> {
    sprint.level_resources(errors, context, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_keeps_order() {
        let mut errors = LevelingErrors::new();
        errors.record(4, "first".into());
        errors.record(2, "second".into());
        errors.record(4, "third".into());
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.for_task(4), vec!["first", "third"]);
        assert_eq!(errors.iter().next(), Some(&(4, "first".to_string())));
    }
}
