//! Sprint scheduling core.
//!
//! Keeps a sprint's task hierarchy and dependency graph consistent under
//! interactive edits, computes start and end dates for every task on a
//! work calendar, and serializes tasks that compete for one assignee.
//!
//! # Modules
//!
//! - **`graph`**: Task store, hierarchy and dependency mutations
//! - **`scheduler`** / **`leveling`**: Date computation
//! - **`sprint`**: The aggregate and its lifecycle
//! - **`loader`** / **`timeline`**: Async collaborators
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use sprint_schedule::config::SchedulingConfig;
//! use sprint_schedule::models::{TaskNode, WorkDuration};
//! use sprint_schedule::sprint::{Sprint, SprintHeader};
//!
//! let mut sprint = Sprint::new(SprintHeader::new(1), SchedulingConfig::default());
//! sprint.initialize().unwrap();
//! sprint.init_user_map(vec![]).unwrap();
//! sprint
//!     .init_task_map(
//!         vec![
//!             TaskNode::task(1).with_order(0).with_estimate(WorkDuration::from_hours(8)),
//!             TaskNode::task(2)
//!                 .with_order(1)
//!                 .with_estimate(WorkDuration::from_hours(4))
//!                 .with_predecessor(1),
//!         ],
//!         vec![],
//!     )
//!     .unwrap();
//!
//! // Monday 2025-01-06, 08:00
//! let as_of = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! sprint.recalculate(as_of).unwrap();
//! assert_eq!(sprint.task(2).unwrap().start, sprint.task(1).unwrap().end);
//! assert_eq!(sprint.format_duration(sprint.remaining()), "1d 4h");
//! ```
//!
//! # References
//!
//! - Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4
//! - Kolisch (1996), "Serial and parallel resource-constrained project
//!   scheduling methods revisited"

pub mod config;
pub mod error;
pub mod graph;
pub mod leveling;
pub mod loader;
pub mod models;
pub mod scheduler;
pub mod sprint;
pub mod timeline;
pub mod validation;

pub use error::{Result, ScheduleError};
pub use graph::{MutationOutcome, NoOpReason};
pub use sprint::{Sprint, SprintCommand, SprintHeader};
