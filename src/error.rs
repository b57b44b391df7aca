//! Crate-level error type.
//!
//! Silent rejections of user gestures (indent with no target, a
//! cycle-producing edge) are not errors; they come back as
//! [`MutationOutcome::NoOp`](crate::graph::MutationOutcome). Everything
//! here is either a caller mistake or a structural problem that makes
//! the computed dates untrustworthy.

use thiserror::Error;

use crate::models::{DurationParseError, TaskId, UserId};
use crate::validation::ValidationError;

/// Errors raised by the scheduling core.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// A mutation or query named a task that is not in the store.
    #[error("Task {0} not found in sprint")]
    UnknownTask(TaskId),

    /// A task was assigned to a user the sprint does not know.
    #[error("User {0} not found in sprint")]
    UnknownUser(UserId),

    /// An estimate field could not be parsed.
    #[error("Invalid {field}: {source}")]
    InvalidEstimate {
        field: &'static str,
        #[source]
        source: DurationParseError,
    },

    /// Raw records failed validation on load.
    #[error("Sprint data failed validation ({} error(s))", .0.len())]
    Validation(Vec<ValidationError>),

    /// The store is internally inconsistent; no dates were produced.
    #[error("Structural integrity violation: {0}")]
    Integrity(String),

    /// A sprint operation was called out of order.
    #[error("Sprint is {actual}, operation requires {expected}")]
    Lifecycle {
        expected: &'static str,
        actual: &'static str,
    },

    /// A leveling or generation pass was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration values are out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A collaborator failed while fetching sprint data.
    #[error("Data source error: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkDayFormat;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", ScheduleError::UnknownTask(42)),
            "Task 42 not found in sprint"
        );
        assert_eq!(
            format!(
                "{}",
                ScheduleError::Lifecycle {
                    expected: "calculated",
                    actual: "new"
                }
            ),
            "Sprint is new, operation requires calculated"
        );
    }

    #[test]
    fn test_invalid_estimate_names_field() {
        let source = WorkDayFormat::default().parse("3x").unwrap_err();
        let err = ScheduleError::InvalidEstimate {
            field: "remaining estimate",
            source,
        };
        assert!(err.to_string().starts_with("Invalid remaining estimate:"));
    }
}
