//! Task node model.
//!
//! A sprint is a flat set of task nodes. Hierarchy (`parent_id`) and
//! dependencies (`predecessors`) are id references into that set, never
//! live pointers; the graph module resolves them.
//!
//! # Node kinds
//!
//! | Kind | Own dates | Own estimate | Can be parent |
//! |------|-----------|--------------|---------------|
//! | Milestone | fixed `start` | no | no |
//! | Story | rolled up from children | no (aggregated) | yes |
//! | Task | derived by the scheduler | yes | no |

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{UserId, WorkDuration};

/// Identifier of a task node.
pub type TaskId = u64;

/// Task node classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Milestone,
    Story,
    Task,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Milestone => "milestone",
            TaskKind::Story => "story",
            TaskKind::Task => "task",
        }
    }
}

/// A dependency edge: `successor_id` cannot start before `predecessor_id` ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    /// Whether the edge is shown in dependency text. Only visible edges
    /// constrain dates.
    pub visible: bool,
}

impl Relation {
    pub fn new(predecessor_id: TaskId, successor_id: TaskId, visible: bool) -> Self {
        Self {
            predecessor_id,
            successor_id,
            visible,
        }
    }
}

/// A milestone, story or task inside a sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    /// Unique node identifier.
    pub id: TaskId,
    /// Display code (e.g. "T-12").
    pub key: String,
    /// Position in the sprint's dense total order.
    pub order_id: usize,
    pub kind: TaskKind,
    pub name: String,
    /// Fixed for milestones, derived for stories and tasks.
    pub start: Option<NaiveDateTime>,
    /// Derived end.
    pub end: Option<NaiveDateTime>,
    /// Optimistic estimate.
    pub min_estimate: WorkDuration,
    /// Pessimistic estimate.
    pub max_estimate: WorkDuration,
    pub original_estimate: WorkDuration,
    /// Work left; drives the schedule.
    pub remaining_estimate: WorkDuration,
    /// Logged effort (sum of worklogs, aggregated for stories).
    #[serde(default)]
    pub worked: WorkDuration,
    /// Assignee (tasks only).
    pub resource_id: Option<UserId>,
    /// Parent story.
    pub parent_id: Option<TaskId>,
    /// Incoming dependency edges, in insertion order.
    pub predecessors: Vec<Relation>,
    /// Changed since the last hand-off to persistence.
    #[serde(skip)]
    pub modified: bool,
}

impl TaskNode {
    /// Creates a node of the given kind.
    pub fn new(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            key: String::new(),
            order_id: 0,
            kind,
            name: String::new(),
            start: None,
            end: None,
            min_estimate: WorkDuration::ZERO,
            max_estimate: WorkDuration::ZERO,
            original_estimate: WorkDuration::ZERO,
            remaining_estimate: WorkDuration::ZERO,
            worked: WorkDuration::ZERO,
            resource_id: None,
            parent_id: None,
            predecessors: Vec::new(),
            modified: false,
        }
    }

    /// Creates a leaf task.
    pub fn task(id: TaskId) -> Self {
        Self::new(id, TaskKind::Task)
    }

    /// Creates a story.
    pub fn story(id: TaskId) -> Self {
        Self::new(id, TaskKind::Story)
    }

    /// Creates a milestone fixed at `start`.
    pub fn milestone(id: TaskId, start: NaiveDateTime) -> Self {
        let mut node = Self::new(id, TaskKind::Milestone);
        node.start = Some(start);
        node.end = Some(start);
        node
    }

    /// Sets the display key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the order position.
    pub fn with_order(mut self, order_id: usize) -> Self {
        self.order_id = order_id;
        self
    }

    /// Sets the parent story.
    pub fn with_parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets original and remaining estimate to the same effort.
    pub fn with_estimate(mut self, effort: WorkDuration) -> Self {
        self.original_estimate = effort;
        self.remaining_estimate = effort;
        self
    }

    /// Sets the remaining estimate.
    pub fn with_remaining(mut self, effort: WorkDuration) -> Self {
        self.remaining_estimate = effort;
        self
    }

    /// Sets the estimate range.
    pub fn with_range(mut self, min: WorkDuration, max: WorkDuration) -> Self {
        self.min_estimate = min;
        self.max_estimate = max;
        self
    }

    /// Assigns a resource.
    pub fn with_resource(mut self, user_id: UserId) -> Self {
        self.resource_id = Some(user_id);
        self
    }

    /// Adds a visible predecessor.
    pub fn with_predecessor(mut self, predecessor_id: TaskId) -> Self {
        self.predecessors
            .push(Relation::new(predecessor_id, self.id, true));
        self
    }

    /// Adds a predecessor hidden from dependency text.
    pub fn with_hidden_predecessor(mut self, predecessor_id: TaskId) -> Self {
        self.predecessors
            .push(Relation::new(predecessor_id, self.id, false));
        self
    }

    pub fn is_story(&self) -> bool {
        self.kind == TaskKind::Story
    }

    pub fn is_milestone(&self) -> bool {
        self.kind == TaskKind::Milestone
    }

    pub fn is_task(&self) -> bool {
        self.kind == TaskKind::Task
    }

    /// Whether an edge from `predecessor_id` exists.
    pub fn has_predecessor(&self, predecessor_id: TaskId) -> bool {
        self.predecessors
            .iter()
            .any(|r| r.predecessor_id == predecessor_id)
    }

    /// Effort the scheduler places on the calendar.
    pub fn scheduling_effort(&self) -> WorkDuration {
        match self.kind {
            TaskKind::Task => self.remaining_estimate,
            TaskKind::Story | TaskKind::Milestone => WorkDuration::ZERO,
        }
    }

    /// Flags the node for persistence.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }
}
