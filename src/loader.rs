//! Concurrent sprint loading.
//!
//! The four record sets a sprint needs are fetched in parallel from a
//! [`SprintSource`] and joined before the synchronous lifecycle runs.
//! A failed fetch fails the whole load; no partially loaded sprint is
//! returned.

use chrono::NaiveDateTime;
use tracing::info;

use crate::config::SchedulingConfig;
use crate::error::Result;
use crate::models::{TaskNode, User, Worklog};
use crate::sprint::{Sprint, SprintHeader, SprintId};

/// Persistence collaborator that hands sprint records to the core.
#[async_trait::async_trait]
pub trait SprintSource: Send + Sync {
    async fn fetch_sprint(&self, sprint_id: SprintId) -> Result<SprintHeader>;
    async fn fetch_users(&self, sprint_id: SprintId) -> Result<Vec<User>>;
    async fn fetch_tasks(&self, sprint_id: SprintId) -> Result<Vec<TaskNode>>;
    async fn fetch_worklogs(&self, sprint_id: SprintId) -> Result<Vec<Worklog>>;
}

/// Fetches, validates and calculates one sprint.
///
/// # Errors
/// The first fetch error, or any lifecycle error (`Validation`,
/// `Integrity`, `Config`).
pub async fn load_sprint(
    source: &dyn SprintSource,
    sprint_id: SprintId,
    config: SchedulingConfig,
    as_of: NaiveDateTime,
) -> Result<Sprint> {
    let (header, users, tasks, worklogs) = tokio::try_join!(
        source.fetch_sprint(sprint_id),
        source.fetch_users(sprint_id),
        source.fetch_tasks(sprint_id),
        source.fetch_worklogs(sprint_id),
    )?;
    info!(
        sprint_id,
        users = users.len(),
        tasks = tasks.len(),
        worklogs = worklogs.len(),
        "sprint records fetched"
    );

    let mut sprint = Sprint::new(header, config);
    sprint.initialize()?;
    sprint.init_user_map(users)?;
    sprint.init_task_map(tasks, worklogs)?;
    sprint.recalculate(as_of)?;
    Ok(sprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use crate::models::WorkDuration;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct MemorySource {
        fail_worklogs: bool,
    }

    #[async_trait::async_trait]
    impl SprintSource for MemorySource {
        async fn fetch_sprint(&self, sprint_id: SprintId) -> Result<SprintHeader> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(SprintHeader::new(sprint_id).with_name("Memory"))
        }

        async fn fetch_users(&self, _sprint_id: SprintId) -> Result<Vec<User>> {
            Ok(vec![User::new(1)])
        }

        async fn fetch_tasks(&self, _sprint_id: SprintId) -> Result<Vec<TaskNode>> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(vec![TaskNode::task(10)
                .with_estimate(WorkDuration::from_hours(4))
                .with_resource(1)])
        }

        async fn fetch_worklogs(&self, _sprint_id: SprintId) -> Result<Vec<Worklog>> {
            if self.fail_worklogs {
                return Err(ScheduleError::Source("worklog store offline".into()));
            }
            Ok(vec![Worklog::new(
                10,
                monday(),
                WorkDuration::from_hours(1),
            )])
        }
    }

    fn monday() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_sprint_joins_and_calculates() {
        let source = MemorySource {
            fail_worklogs: false,
        };
        let sprint = load_sprint(&source, 3, SchedulingConfig::default(), monday())
            .await
            .unwrap();
        assert_eq!(sprint.id(), 3);
        assert!(sprint.is_calculated());
        assert_eq!(sprint.worked(), WorkDuration::from_hours(1));
        assert_eq!(sprint.task(10).unwrap().worked, WorkDuration::from_hours(1));
    }

    #[tokio::test]
    async fn test_failed_fetch_fails_load() {
        let source = MemorySource { fail_worklogs: true };
        let err = load_sprint(&source, 3, SchedulingConfig::default(), monday())
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Source(_)));
    }
}
