//! Serial forward-push leveler.
//!
//! # Algorithm
//!
//! 1. Visit leaves in scheduling order (visible predecessors first, ties by
//!    order position), so earlier rows win a contested resource.
//! 2. Start = max(scheduled start, leveled end of every visible
//!    predecessor).
//! 3. Place the remaining effort on the assignee's calendar. If the
//!    window overlaps one already placed for that assignee, restart at
//!    the latest overlapping end and try again.
//! 4. Record the window for the assignee.
//!
//! Each retry starts strictly later at the end of a placed window, so the
//! loop ends after at most one retry per placed window.
//!
//! # Reference
//! Kolisch (1996), serial schedule generation scheme

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::{ErrorCollector, LevelingContext};
use crate::error::{Result, ScheduleError};
use crate::graph::{EffectiveGraph, TaskStore};
use crate::models::{TaskId, TaskKind, TimeWindow, User, UserId, WorkCalendar};
use crate::scheduler::ForwardScheduler;

/// Leveled dates not yet written to the store.
#[derive(Debug, Clone, Default)]
pub struct LevelingPlan {
    /// `(task, start, end)` in visiting order.
    pub dates: Vec<(TaskId, NaiveDateTime, NaiveDateTime)>,
    /// Leaves visited.
    pub visited: usize,
}

impl LevelingPlan {
    /// Writes the plan into `store`, returning the tasks that moved later.
    pub fn apply(&self, store: &mut TaskStore) -> Vec<TaskId> {
        let mut delayed = Vec::new();
        for &(id, start, end) in &self.dates {
            let Some(node) = store.get_mut(id) else {
                continue;
            };
            if node.start.is_some_and(|s| start > s) {
                delayed.push(id);
            }
            if node.start != Some(start) || node.end != Some(end) {
                node.start = Some(start);
                node.end = Some(end);
                node.mark_modified();
            }
        }
        delayed
    }
}

/// Resource leveler over a calculated store.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLeveler<'a> {
    scheduler: ForwardScheduler<'a>,
    users: &'a HashMap<UserId, User>,
}

impl<'a> ResourceLeveler<'a> {
    pub fn new(calendar: &'a WorkCalendar, users: &'a HashMap<UserId, User>) -> Self {
        Self {
            scheduler: ForwardScheduler::new(calendar, users),
            users,
        }
    }

    /// Computes leveled dates without touching the store.
    ///
    /// Problems with single tasks go to `errors`; the task keeps its best
    /// available dates and the pass continues.
    ///
    /// # Errors
    /// `Integrity` if the graph is inconsistent or a leaf has no
    /// scheduled dates; `Cancelled` if `context` is cancelled.
    pub fn plan(
        &self,
        store: &TaskStore,
        errors: &mut dyn ErrorCollector,
        context: &LevelingContext,
    ) -> Result<LevelingPlan> {
        let graph = EffectiveGraph::build(store)?;
        let mut leveled: HashMap<TaskId, NaiveDateTime> = HashMap::new();
        let mut placed: HashMap<UserId, Vec<TimeWindow>> = HashMap::new();
        let mut plan = LevelingPlan::default();

        for &id in graph.order() {
            if context.is_cancelled() {
                debug!(visited = plan.visited, "leveling cancelled");
                return Err(ScheduleError::Cancelled);
            }
            plan.visited += 1;

            let node = store.node(id)?;
            let (Some(scheduled_start), Some(scheduled_end)) = (node.start, node.end) else {
                return Err(ScheduleError::Integrity(format!(
                    "task {id} has no scheduled dates"
                )));
            };
            let ready = graph
                .visible_predecessors(id)
                .iter()
                .filter_map(|p| leveled.get(p).map(|&end| (*p, end)))
                .max_by_key(|&(_, end)| end);

            if node.kind == TaskKind::Milestone {
                if let Some((pred, end)) = ready.filter(|&(_, end)| end > scheduled_start) {
                    errors.record(
                        id,
                        format!(
                            "milestone fixed at {scheduled_start} precedes the leveled end {end} of task {pred}"
                        ),
                    );
                }
                leveled.insert(id, scheduled_start);
                continue;
            }

            let mut start = ready.map_or(scheduled_start, |(_, end)| end.max(scheduled_start));
            let effort = node.scheduling_effort();
            let resource = node.resource_id.filter(|&user| context.levels(user));

            let user = match resource {
                Some(user_id) if !self.users.contains_key(&user_id) => {
                    errors.record(id, format!("assigned to unknown resource {user_id}"));
                    None
                }
                other => other,
            };
            let calendar = self.scheduler.calendar_for(node.resource_id);

            let end = loop {
                let end = match self.scheduler.finish(id, calendar, start, effort) {
                    Ok(end) => end,
                    Err(err) => {
                        warn!(task_id = id, %err, "keeping scheduled end");
                        errors.record(id, format!("cannot place effort: {err}"));
                        start = start.min(scheduled_end);
                        break scheduled_end;
                    }
                };
                let Some(user_id) = user else {
                    break end;
                };
                let window = TimeWindow::new(start, end);
                let windows = placed.entry(user_id).or_default();
                let busy = windows
                    .iter()
                    .filter(|w| w.overlaps(&window))
                    .map(|w| w.end)
                    .max();
                match busy {
                    Some(busy_until) => start = busy_until,
                    None => {
                        windows.push(window);
                        break end;
                    }
                }
            };

            if start > scheduled_start {
                debug!(task_id = id, from = %scheduled_start, to = %start, "task pushed");
            }
            leveled.insert(id, end);
            plan.dates.push((id, start, end));
        }

        Ok(plan)
    }
}
