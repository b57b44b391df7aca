//! Topological forward pass.
//!
//! # Algorithm
//!
//! 1. Anchor = `as_of` truncated to the minute, moved to the sprint
//!    calendar's next working instant.
//! 2. Visit leaves in effective-graph order (visible predecessors first, ties by
//!    order position).
//! 3. MILESTONE: start is fixed, end = start.
//! 4. TASK: start = max(anchor, end of every visible effective
//!    predecessor); end = start + remaining estimate on the assignee's
//!    calendar (sprint calendar when unassigned).
//! 5. Roll dates and effort up into stories and the sprint.
//!
//! Starts derive from the anchor only, never from previously stored
//! dates, so repeated runs produce identical output.
//!
//! Effort that does not fit the calendar horizon does not abort the
//! pass: the task ends at the last reachable working instant and is
//! reported in [`ForwardPass::unplaced`].
//!
//! # Complexity
//! O(V + E) for the pass plus calendar walks proportional to effort.
//!
//! # Reference
//! Kelley & Walker (1959), "Critical-Path Planning and Scheduling" (forward pass)

use std::collections::HashMap;

use chrono::{NaiveDateTime, Timelike};
use tracing::{debug, warn};

use super::SprintTotals;
use crate::error::{Result, ScheduleError};
use crate::graph::{EffectiveGraph, TaskStore};
use crate::models::{TaskId, TaskKind, User, UserId, WorkCalendar, WorkDuration};

/// Result of a forward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardPass {
    pub totals: SprintTotals,
    /// Tasks whose end was clamped to the calendar horizon, in visiting order.
    pub unplaced: Vec<TaskId>,
}

/// Dependency-driven forward scheduler.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use chrono::NaiveDate;
/// use sprint_schedule::config::SchedulingConfig;
/// use sprint_schedule::graph::TaskStore;
/// use sprint_schedule::models::{TaskNode, WorkDuration};
/// use sprint_schedule::scheduler::ForwardScheduler;
///
/// let mut store = TaskStore::from_nodes(vec![
///     TaskNode::task(1).with_order(0).with_estimate(WorkDuration::from_hours(8)),
///     TaskNode::task(2).with_order(1).with_estimate(WorkDuration::from_hours(8)).with_predecessor(1),
/// ]);
/// let calendar = SchedulingConfig::default().base_calendar();
/// let users = HashMap::new();
/// let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(8, 0, 0).unwrap();
///
/// ForwardScheduler::new(&calendar, &users)
///     .run(&mut store, &HashMap::new(), monday)
///     .unwrap();
/// assert_eq!(store.node(2).unwrap().start, store.node(1).unwrap().end);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ForwardScheduler<'a> {
    calendar: &'a WorkCalendar,
    users: &'a HashMap<UserId, User>,
}

impl<'a> ForwardScheduler<'a> {
    /// Creates a scheduler over the sprint calendar and user map.
    pub fn new(calendar: &'a WorkCalendar, users: &'a HashMap<UserId, User>) -> Self {
        Self { calendar, users }
    }

    /// First working instant at or after `as_of`.
    ///
    /// # Errors
    /// `Config` if the sprint calendar has no working time in its horizon.
    pub fn anchor(&self, as_of: NaiveDateTime) -> Result<NaiveDateTime> {
        let truncated = as_of
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(as_of);
        self.calendar.next_working_time(truncated).ok_or_else(|| {
            ScheduleError::Config(format!("sprint calendar has no working time after {as_of}"))
        })
    }

    /// Calendar a task's effort is placed on.
    pub fn calendar_for(&self, resource: Option<UserId>) -> &'a WorkCalendar {
        resource
            .and_then(|id| self.users.get(&id))
            .map(|user| user.calendar_or(self.calendar))
            .unwrap_or(self.calendar)
    }

    /// End of `effort` started at `start` on `calendar`, falling back to
    /// the sprint calendar when the personal one has no room.
    pub(crate) fn finish(
        &self,
        task_id: TaskId,
        calendar: &WorkCalendar,
        start: NaiveDateTime,
        effort: WorkDuration,
    ) -> Result<NaiveDateTime> {
        if let Some(end) = calendar.add_work(start, effort) {
            return Ok(end);
        }
        warn!(task_id, "assignee calendar has no room, using sprint calendar");
        self.calendar.add_work(start, effort).ok_or_else(|| {
            ScheduleError::Config(format!(
                "sprint calendar cannot fit task {task_id} starting at {start}"
            ))
        })
    }

    /// Computes every date and aggregate in place.
    ///
    /// Nodes whose derived fields change are marked modified.
    ///
    /// # Errors
    /// `Integrity` on dangling references or a cyclic effective graph;
    /// nothing is written in that case.
    pub fn run(
        &self,
        store: &mut TaskStore,
        logged: &HashMap<TaskId, WorkDuration>,
        as_of: NaiveDateTime,
    ) -> Result<ForwardPass> {
        store.check_integrity()?;
        let graph = EffectiveGraph::build(store)?;
        let anchor = self.anchor(as_of)?;

        let mut dates: HashMap<TaskId, (NaiveDateTime, NaiveDateTime)> = HashMap::new();
        let mut unplaced = Vec::new();
        for &id in graph.order() {
            let node = store.node(id)?;
            let (start, end) = match node.kind {
                TaskKind::Milestone => {
                    let start = node.start.ok_or_else(|| {
                        ScheduleError::Integrity(format!("milestone {id} has no start"))
                    })?;
                    (start, start)
                }
                TaskKind::Task => {
                    let start = graph
                        .visible_predecessors(id)
                        .iter()
                        .filter_map(|p| dates.get(p).map(|&(_, end)| end))
                        .fold(anchor, NaiveDateTime::max);
                    let calendar = self.calendar_for(node.resource_id);
                    let end = match self.finish(id, calendar, start, node.scheduling_effort()) {
                        Ok(end) => end,
                        Err(err) => {
                            warn!(task_id = id, %err, "effort exceeds calendar horizon, clamping end");
                            unplaced.push(id);
                            self.calendar.horizon_end(start)
                        }
                    };
                    (start, end)
                }
                TaskKind::Story => continue,
            };
            dates.insert(id, (start, end));
        }

        let mut changed = 0;
        for (&id, &(start, end)) in &dates {
            let node = store.node_mut(id)?;
            if node.start != Some(start) || node.end != Some(end) {
                node.start = Some(start);
                node.end = Some(end);
                node.mark_modified();
                changed += 1;
            }
        }

        let totals = SprintTotals::calculate(store, logged);
        debug!(leaves = graph.len(), changed, unplaced = unplaced.len(), %anchor, "forward pass complete");
        Ok(ForwardPass { totals, unplaced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingConfig;
    use crate::models::TaskNode;
    use chrono::NaiveDate;

    // 2025-01-06 is a Monday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn hours(h: u64) -> WorkDuration {
        WorkDuration::from_hours(h)
    }

    fn run(store: &mut TaskStore, users: &HashMap<UserId, User>, as_of: NaiveDateTime) -> SprintTotals {
        let calendar = SchedulingConfig::default().base_calendar();
        ForwardScheduler::new(&calendar, users)
            .run(store, &HashMap::new(), as_of)
            .unwrap()
            .totals
    }

    #[test]
    fn test_anchor_moves_to_working_time() {
        let calendar = SchedulingConfig::default().base_calendar();
        let users = HashMap::new();
        let s = ForwardScheduler::new(&calendar, &users);
        // Saturday evening → Monday 08:00
        assert_eq!(s.anchor(at(4, 19, 30)).unwrap(), at(6, 8, 0));
        let with_seconds = at(6, 9, 15).with_second(42).unwrap();
        assert_eq!(s.anchor(with_seconds).unwrap(), at(6, 9, 15));
    }

    #[test]
    fn test_chain_follows_predecessor_end() {
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::task(2).with_order(1).with_parent(1).with_estimate(hours(8)),
            TaskNode::task(3)
                .with_order(2)
                .with_parent(1)
                .with_estimate(hours(8))
                .with_predecessor(2),
        ]);
        let totals = run(&mut store, &HashMap::new(), at(6, 8, 0));

        let t1 = store.node(2).unwrap();
        let t2 = store.node(3).unwrap();
        assert_eq!(t1.start, Some(at(6, 8, 0)));
        assert_eq!(t1.end, Some(at(6, 16, 0)));
        assert_eq!(t2.start, t1.end);
        assert_eq!(t2.end, Some(at(7, 16, 0)));
        assert_eq!(store.node(1).unwrap().end, Some(at(7, 16, 0)));
        assert_eq!(totals.remaining, hours(16));
    }

    #[test]
    fn test_hidden_predecessor_does_not_delay() {
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::task(1).with_order(0).with_estimate(hours(4)),
            TaskNode::task(2)
                .with_order(1)
                .with_estimate(hours(4))
                .with_hidden_predecessor(1),
        ]);
        run(&mut store, &HashMap::new(), at(6, 8, 0));
        assert_eq!(store.node(2).unwrap().start, Some(at(6, 8, 0)));
    }

    #[test]
    fn test_milestone_start_is_never_rewritten() {
        let fixed = at(8, 12, 0);
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::task(1).with_order(0).with_estimate(hours(40)),
            TaskNode::milestone(2, fixed).with_order(1).with_predecessor(1),
            TaskNode::task(3)
                .with_order(2)
                .with_estimate(hours(2))
                .with_predecessor(2),
        ]);
        run(&mut store, &HashMap::new(), at(6, 8, 0));
        let m = store.node(2).unwrap();
        assert_eq!(m.start, Some(fixed));
        assert_eq!(m.end, Some(fixed));
        assert_eq!(store.node(3).unwrap().start, Some(fixed));
        assert_eq!(store.node(3).unwrap().end, Some(at(8, 14, 0)));
    }

    #[test]
    fn test_story_predecessor_constrains_all_children() {
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::task(1).with_order(0).with_estimate(hours(8)),
            TaskNode::story(2).with_order(1).with_predecessor(1),
            TaskNode::task(3).with_order(2).with_parent(2).with_estimate(hours(2)),
            TaskNode::task(4).with_order(3).with_parent(2).with_estimate(hours(2)),
        ]);
        run(&mut store, &HashMap::new(), at(6, 8, 0));
        assert_eq!(store.node(3).unwrap().start, Some(at(6, 16, 0)));
        assert_eq!(store.node(4).unwrap().start, Some(at(6, 16, 0)));
        assert_eq!(store.node(2).unwrap().start, Some(at(6, 16, 0)));
    }

    #[test]
    fn test_assignee_calendar_is_used() {
        let half = SchedulingConfig::default()
            .base_calendar()
            .with_availability(0.5);
        let users = HashMap::from([(7, User::new(7).with_calendar(half))]);
        let mut store = TaskStore::from_nodes(vec![TaskNode::task(1)
            .with_estimate(hours(8))
            .with_resource(7)]);
        run(&mut store, &users, at(6, 8, 0));
        assert_eq!(store.node(1).unwrap().end, Some(at(7, 12, 0)));
    }

    #[test]
    fn test_rerun_is_identical_and_marks_nothing() {
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::task(2).with_order(1).with_parent(1).with_estimate(hours(3)),
            TaskNode::task(3)
                .with_order(2)
                .with_parent(1)
                .with_estimate(WorkDuration::from_minutes(95))
                .with_predecessor(2),
        ]);
        let first = run(&mut store, &HashMap::new(), at(6, 9, 7));
        let snapshot: Vec<_> = store.iter().map(|n| (n.id, n.start, n.end)).collect();
        store.take_modified();

        let second = run(&mut store, &HashMap::new(), at(6, 9, 7));
        let again: Vec<_> = store.iter().map(|n| (n.id, n.start, n.end)).collect();
        assert_eq!(first, second);
        assert_eq!(snapshot, again);
        assert!(store.modified_ids().is_empty());
    }

    #[test]
    fn test_oversized_effort_is_clamped_not_fatal() {
        let calendar = SchedulingConfig::default().base_calendar().with_search_days(5);
        let users = HashMap::new();
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::task(1).with_order(0).with_estimate(hours(80)),
            TaskNode::task(2).with_order(1).with_estimate(hours(4)),
            TaskNode::task(3)
                .with_order(2)
                .with_estimate(hours(2))
                .with_predecessor(1),
        ]);
        let pass = ForwardScheduler::new(&calendar, &users)
            .run(&mut store, &HashMap::new(), at(6, 8, 0))
            .unwrap();

        assert_eq!(pass.unplaced, vec![1]);
        assert_eq!(store.node(1).unwrap().end, Some(at(10, 16, 0)));
        assert_eq!(store.node(2).unwrap().start, Some(at(6, 8, 0)));
        assert_eq!(store.node(2).unwrap().end, Some(at(6, 12, 0)));
        assert_eq!(store.node(3).unwrap().start, Some(at(10, 16, 0)));
        assert_eq!(store.node(3).unwrap().end, Some(at(13, 10, 0)));
    }

    #[test]
    fn test_dangling_predecessor_aborts() {
        let mut store = TaskStore::from_nodes(vec![TaskNode::task(1).with_predecessor(9)]);
        let calendar = SchedulingConfig::default().base_calendar();
        let users = HashMap::new();
        let err = ForwardScheduler::new(&calendar, &users)
            .run(&mut store, &HashMap::new(), at(6, 8, 0))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Integrity(_)));
        assert_eq!(store.node(1).unwrap().start, None);
    }
}
