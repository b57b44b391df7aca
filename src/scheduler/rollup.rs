//! Bottom-up aggregation (task → story → sprint).
//!
//! # Aggregates
//!
//! | Field | Story | Sprint |
//! |-------|-------|--------|
//! | start | min start of descendant leaves | min start of all leaves |
//! | end | max end of descendant leaves | max end of all leaves |
//! | original / remaining | sum over descendant tasks | sum over all tasks |
//! | min / max estimate | sum over descendant tasks | not aggregated |
//! | worked | logged on the story and its subtree | all logged effort |
//!
//! Stories without leaves get no dates and zero effort.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::graph::TaskStore;
use crate::models::{TaskId, WorkDuration};

/// Sprint-level aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintTotals {
    /// Sum of task original estimates.
    pub original_estimation: WorkDuration,
    /// Sum of logged effort.
    pub worked: WorkDuration,
    /// Sum of task remaining estimates.
    pub remaining: WorkDuration,
    /// Earliest leaf start.
    pub start: Option<NaiveDateTime>,
    /// Latest leaf end.
    pub end: Option<NaiveDateTime>,
}

impl SprintTotals {
    /// Rolls derived fields up into every story and returns the sprint totals.
    ///
    /// # Arguments
    /// * `store` - Leaves must already carry their dates.
    /// * `logged` - Logged effort per node (sum of its worklogs).
    pub fn calculate(store: &mut TaskStore, logged: &HashMap<TaskId, WorkDuration>) -> Self {
        let mut worked: HashMap<TaskId, WorkDuration> = HashMap::new();
        for (&id, &effort) in logged {
            if !store.contains(id) {
                continue;
            }
            *worked.entry(id).or_default() += effort;
            for ancestor in store.ancestors(id) {
                *worked.entry(ancestor).or_default() += effort;
            }
        }

        let stories: Vec<TaskId> = store.iter().filter(|n| n.is_story()).map(|n| n.id).collect();
        for story in stories {
            let agg = Aggregate::over(store, &store.leaves_of(story));
            let story_worked = worked.get(&story).copied().unwrap_or_default();
            if let Some(node) = store.get_mut(story) {
                let changed = node.start != agg.start
                    || node.end != agg.end
                    || node.original_estimate != agg.original
                    || node.remaining_estimate != agg.remaining
                    || node.min_estimate != agg.min
                    || node.max_estimate != agg.max
                    || node.worked != story_worked;
                if changed {
                    node.start = agg.start;
                    node.end = agg.end;
                    node.original_estimate = agg.original;
                    node.remaining_estimate = agg.remaining;
                    node.min_estimate = agg.min;
                    node.max_estimate = agg.max;
                    node.worked = story_worked;
                    node.mark_modified();
                }
            }
        }

        let leaves: Vec<TaskId> = store.iter().filter(|n| !n.is_story()).map(|n| n.id).collect();
        for &leaf in &leaves {
            let leaf_worked = worked.get(&leaf).copied().unwrap_or_default();
            if let Some(node) = store.get_mut(leaf) {
                if node.worked != leaf_worked {
                    node.worked = leaf_worked;
                    node.mark_modified();
                }
            }
        }

        let all = Aggregate::over(store, &leaves);
        Self {
            original_estimation: all.original,
            worked: logged
                .iter()
                .filter(|(id, _)| store.contains(**id))
                .map(|(_, effort)| *effort)
                .sum(),
            remaining: all.remaining,
            start: all.start,
            end: all.end,
        }
    }
}

#[derive(Default)]
struct Aggregate {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    original: WorkDuration,
    remaining: WorkDuration,
    min: WorkDuration,
    max: WorkDuration,
}

impl Aggregate {
    fn over(store: &TaskStore, leaves: &[TaskId]) -> Self {
        let mut agg = Self::default();
        for node in leaves.iter().filter_map(|&id| store.get(id)) {
            agg.start = min_opt(agg.start, node.start);
            agg.end = max_opt(agg.end, node.end);
            if node.is_task() {
                agg.original += node.original_estimate;
                agg.remaining += node.remaining_estimate;
                agg.min += node.min_estimate;
                agg.max += node.max_estimate;
            }
        }
        agg
    }
}

fn min_opt(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn max_opt(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    a.max(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskNode;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn dated(mut node: TaskNode, start: NaiveDateTime, end: NaiveDateTime) -> TaskNode {
        node.start = Some(start);
        node.end = Some(end);
        node
    }

    #[test]
    fn test_story_rollup() {
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::story(2).with_order(1).with_parent(1),
            dated(
                TaskNode::task(3)
                    .with_order(2)
                    .with_parent(2)
                    .with_estimate(WorkDuration::from_hours(8))
                    .with_range(WorkDuration::from_hours(4), WorkDuration::from_hours(10)),
                at(6, 8),
                at(6, 16),
            ),
            dated(
                TaskNode::task(4)
                    .with_order(3)
                    .with_parent(1)
                    .with_estimate(WorkDuration::from_hours(4))
                    .with_remaining(WorkDuration::from_hours(2)),
                at(7, 8),
                at(7, 10),
            ),
            TaskNode::story(5).with_order(4),
        ]);
        let logged = HashMap::from([(3, WorkDuration::from_hours(1)), (1, WorkDuration::from_hours(2))]);

        let totals = SprintTotals::calculate(&mut store, &logged);

        let outer = store.node(1).unwrap();
        assert_eq!(outer.start, Some(at(6, 8)));
        assert_eq!(outer.end, Some(at(7, 10)));
        assert_eq!(outer.original_estimate, WorkDuration::from_hours(12));
        assert_eq!(outer.remaining_estimate, WorkDuration::from_hours(10));
        assert_eq!(outer.worked, WorkDuration::from_hours(3));
        assert!(outer.modified);

        let inner = store.node(2).unwrap();
        assert_eq!(inner.end, Some(at(6, 16)));
        assert_eq!(inner.max_estimate, WorkDuration::from_hours(10));
        assert_eq!(inner.worked, WorkDuration::from_hours(1));

        let empty = store.node(5).unwrap();
        assert_eq!(empty.start, None);
        assert!(empty.remaining_estimate.is_zero());

        assert_eq!(totals.original_estimation, WorkDuration::from_hours(12));
        assert_eq!(totals.remaining, WorkDuration::from_hours(10));
        assert_eq!(totals.worked, WorkDuration::from_hours(3));
        assert_eq!(totals.start, Some(at(6, 8)));
        assert_eq!(totals.end, Some(at(7, 10)));
    }

    #[test]
    fn test_milestone_dates_count_but_not_effort() {
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::milestone(2, at(10, 8)).with_order(1).with_parent(1),
        ]);
        let totals = SprintTotals::calculate(&mut store, &HashMap::new());
        assert_eq!(store.node(1).unwrap().end, Some(at(10, 8)));
        assert!(totals.original_estimation.is_zero());
        assert_eq!(totals.end, Some(at(10, 8)));
    }

    #[test]
    fn test_unchanged_rollup_marks_nothing() {
        let mut store = TaskStore::from_nodes(vec![TaskNode::story(1)]);
        SprintTotals::calculate(&mut store, &HashMap::new());
        assert!(store.modified_ids().is_empty());
    }
}
