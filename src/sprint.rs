//! Sprint aggregate.
//!
//! A [`Sprint`] owns one sprint's task store, user map and logged effort,
//! and is the unit collaborators load, mutate and persist. It runs a
//! fixed lifecycle:
//!
//! ```text
//! new → initialize → init_user_map → init_task_map → recalculate
//! ```
//!
//! Derived fields (dates, story aggregates, sprint totals) are valid only
//! in the `Calculated` phase. Any applied change drops the sprint back to
//! `TasksLoaded` until the next `recalculate`.
//!
//! Mutations return [`MutationOutcome`]; a `NoOp` means the gesture was
//! rejected and nothing changed. Every changed node is flagged for
//! persistence and handed off through [`Sprint::take_modified`].

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::config::SchedulingConfig;
use crate::error::{Result, ScheduleError};
use crate::graph::{MutationOutcome, NoOpReason, TaskStore};
use crate::leveling::{ErrorCollector, LevelingContext, LevelingReport, ResourceLeveler};
use crate::models::{
    TaskId, TaskNode, User, UserId, WorkCalendar, WorkDayFormat, WorkDuration, Worklog,
};
use crate::scheduler::{ForwardScheduler, SprintTotals};
use crate::validation::{check_estimates, validate_sprint, ValidationError, ValidationErrorKind};

/// Identifier of a sprint.
pub type SprintId = u64;

/// Sprint workflow status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SprintStatus {
    #[default]
    Created,
    Started,
    Closed,
}

/// Sprint record as loaded from persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprintHeader {
    pub id: SprintId,
    pub name: String,
    pub status: SprintStatus,
    /// Whole days without work for everyone (holidays).
    #[serde(default)]
    pub non_working_days: Vec<NaiveDate>,
}

impl SprintHeader {
    pub fn new(id: SprintId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_status(mut self, status: SprintStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_non_working_day(mut self, date: NaiveDate) -> Self {
        self.non_working_days.push(date);
        self
    }
}

/// Lifecycle position of a sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SprintPhase {
    New,
    Initialized,
    UsersLoaded,
    TasksLoaded,
    Calculated,
}

impl SprintPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintPhase::New => "new",
            SprintPhase::Initialized => "initialized",
            SprintPhase::UsersLoaded => "users loaded",
            SprintPhase::TasksLoaded => "tasks loaded",
            SprintPhase::Calculated => "calculated",
        }
    }
}

/// Editable estimate of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateField {
    Min,
    Max,
    Original,
    Remaining,
}

impl EstimateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateField::Min => "min estimate",
            EstimateField::Max => "max estimate",
            EstimateField::Original => "original estimate",
            EstimateField::Remaining => "remaining estimate",
        }
    }
}

/// Graph-changing gesture issued by a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SprintCommand {
    Move {
        from: usize,
        to: usize,
    },
    Indent {
        task_id: TaskId,
    },
    Outdent {
        task_id: TaskId,
    },
    AddChild {
        parent_id: TaskId,
        task_id: TaskId,
    },
    RemoveChild {
        parent_id: TaskId,
        task_id: TaskId,
    },
    AddDependency {
        successor_id: TaskId,
        predecessor_id: TaskId,
        #[serde(default = "visible_default")]
        visible: bool,
    },
    RemoveDependency {
        successor_id: TaskId,
        predecessor_id: TaskId,
    },
    /// Drop-onto: add if absent, remove if present.
    ToggleDependency {
        successor_id: TaskId,
        predecessor_id: TaskId,
        #[serde(default = "visible_default")]
        visible: bool,
    },
}

fn visible_default() -> bool {
    true
}

/// One sprint's scheduling state.
#[derive(Debug, Clone)]
pub struct Sprint {
    header: SprintHeader,
    config: SchedulingConfig,
    format: WorkDayFormat,
    calendar: WorkCalendar,
    users: HashMap<UserId, User>,
    store: TaskStore,
    logged: HashMap<TaskId, WorkDuration>,
    totals: SprintTotals,
    unplaced: Vec<TaskId>,
    phase: SprintPhase,
    as_of: Option<NaiveDateTime>,
    leveled: bool,
}

impl Sprint {
    /// Creates a sprint in the `New` phase.
    pub fn new(header: SprintHeader, config: SchedulingConfig) -> Self {
        Self {
            format: config.duration_format(),
            calendar: config.base_calendar(),
            header,
            config,
            users: HashMap::new(),
            store: TaskStore::new(),
            logged: HashMap::new(),
            totals: SprintTotals::default(),
            unplaced: Vec::new(),
            phase: SprintPhase::New,
            as_of: None,
            leveled: false,
        }
    }

    // ======================== Lifecycle ========================

    /// Validates the configuration, builds the sprint calendar and clears
    /// all loaded state. May be called again to start over.
    ///
    /// # Errors
    /// `Config` if the configuration is out of range.
    pub fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        self.format = self.config.duration_format();
        self.calendar = self
            .header
            .non_working_days
            .iter()
            .fold(self.config.base_calendar(), |cal, &day| {
                cal.with_blocked_days(day, day)
            });
        self.users.clear();
        self.store = TaskStore::new();
        self.logged.clear();
        self.totals = SprintTotals::default();
        self.unplaced.clear();
        self.as_of = None;
        self.leveled = false;
        self.phase = SprintPhase::Initialized;
        debug!(sprint_id = self.header.id, "sprint initialized");
        Ok(())
    }

    /// Loads the user map.
    ///
    /// # Errors
    /// `Lifecycle` unless just initialized; `Validation` on duplicate ids.
    pub fn init_user_map(&mut self, users: Vec<User>) -> Result<()> {
        self.require_exact(SprintPhase::Initialized)?;
        validate_sprint(&[], &users, &[]).map_err(ScheduleError::Validation)?;
        self.users = users.into_iter().map(|u| (u.id, u)).collect();
        self.phase = SprintPhase::UsersLoaded;
        debug!(sprint_id = self.header.id, users = self.users.len(), "user map loaded");
        Ok(())
    }

    /// Loads and validates task records and worklogs, then builds the
    /// store. Order ids are normalized to a dense sequence.
    ///
    /// # Errors
    /// `Lifecycle` unless users are loaded; `Validation` with every
    /// problem found in the records.
    pub fn init_task_map(&mut self, tasks: Vec<TaskNode>, worklogs: Vec<Worklog>) -> Result<()> {
        self.require_exact(SprintPhase::UsersLoaded)?;
        validate_sprint(&tasks, &[], &worklogs).map_err(ScheduleError::Validation)?;

        let mut logged: HashMap<TaskId, WorkDuration> = HashMap::new();
        for log in &worklogs {
            *logged.entry(log.task_id).or_default() += log.time_spent;
        }
        self.logged = logged;
        self.store = TaskStore::from_nodes(tasks);
        self.phase = SprintPhase::TasksLoaded;
        info!(
            sprint_id = self.header.id,
            tasks = self.store.len(),
            worklogs = worklogs.len(),
            "task map loaded"
        );
        Ok(())
    }

    /// Recomputes every date and aggregate for `as_of`.
    ///
    /// Idempotent: an unchanged graph and `as_of` give identical output
    /// and mark nothing modified.
    ///
    /// Tasks whose effort overruns the calendar horizon still get dates,
    /// clamped to the horizon, and are listed by [`Sprint::unplaced`].
    ///
    /// # Errors
    /// `Lifecycle` before tasks are loaded; `Integrity` if the store is
    /// inconsistent (nothing is written).
    pub fn recalculate(&mut self, as_of: NaiveDateTime) -> Result<&SprintTotals> {
        self.require(SprintPhase::TasksLoaded)?;
        let pass = ForwardScheduler::new(&self.calendar, &self.users).run(
            &mut self.store,
            &self.logged,
            as_of,
        )?;
        let totals = pass.totals;
        self.totals = totals;
        self.unplaced = pass.unplaced;
        self.as_of = Some(as_of);
        self.leveled = false;
        self.phase = SprintPhase::Calculated;
        info!(
            sprint_id = self.header.id,
            %as_of,
            remaining = %self.format.format(totals.remaining),
            unplaced = self.unplaced.len(),
            "sprint recalculated"
        );
        Ok(&self.totals)
    }

    pub fn is_calculated(&self) -> bool {
        self.phase == SprintPhase::Calculated
    }

    /// Serializes tasks that share an assignee.
    ///
    /// Recalculates first unless the sprint already holds an unleveled
    /// schedule for `as_of`. Per-task problems go to `errors`.
    ///
    /// # Errors
    /// `Lifecycle` before tasks are loaded; `Cancelled` if `context` is
    /// cancelled, in which case no leveled date is committed.
    pub fn level_resources(
        &mut self,
        errors: &mut dyn ErrorCollector,
        context: &LevelingContext,
        as_of: NaiveDateTime,
    ) -> Result<LevelingReport> {
        let span = info_span!(
            "level_resources",
            sprint_id = self.header.id,
            session = context.session.as_deref().unwrap_or("-")
        );
        let _guard = span.enter();

        self.require(SprintPhase::TasksLoaded)?;
        if !(self.is_calculated() && self.as_of == Some(as_of) && !self.leveled) {
            self.recalculate(as_of)?;
        }

        let plan = ResourceLeveler::new(&self.calendar, &self.users).plan(&self.store, errors, context)?;
        let delayed = plan.apply(&mut self.store);
        self.totals = SprintTotals::calculate(&mut self.store, &self.logged);
        self.leveled = true;
        info!(visited = plan.visited, delayed = delayed.len(), "resources leveled");
        Ok(LevelingReport {
            visited: plan.visited,
            delayed,
        })
    }

    // ======================== Graph mutations ========================

    pub fn add_child(&mut self, parent: TaskId, node: TaskId) -> Result<MutationOutcome> {
        self.mutate(|store| store.add_child(parent, node))
    }

    pub fn remove_child(&mut self, parent: TaskId, node: TaskId) -> Result<MutationOutcome> {
        self.mutate(|store| store.remove_child(parent, node))
    }

    pub fn indent(&mut self, node: TaskId) -> Result<MutationOutcome> {
        self.mutate(|store| store.indent(node))
    }

    pub fn outdent(&mut self, node: TaskId) -> Result<MutationOutcome> {
        self.mutate(|store| store.outdent(node))
    }

    pub fn add_predecessor(
        &mut self,
        successor: TaskId,
        predecessor: TaskId,
        visible: bool,
    ) -> Result<MutationOutcome> {
        self.mutate(|store| store.add_predecessor(successor, predecessor, visible))
    }

    pub fn remove_predecessor(&mut self, successor: TaskId, predecessor: TaskId) -> Result<MutationOutcome> {
        self.mutate(|store| store.remove_predecessor(successor, predecessor))
    }

    pub fn toggle_predecessor(
        &mut self,
        successor: TaskId,
        predecessor: TaskId,
        visible: bool,
    ) -> Result<MutationOutcome> {
        self.mutate(|store| store.toggle_predecessor(successor, predecessor, visible))
    }

    /// Moves the row at `from` to `to` in the flat order.
    pub fn move_node(&mut self, from: usize, to: usize) -> Result<MutationOutcome> {
        self.mutate(|store| Ok(store.move_node(from, to)))
    }

    /// Applies one UI command atomically.
    pub fn apply(&mut self, command: SprintCommand) -> Result<MutationOutcome> {
        debug!(?command, "applying command");
        match command {
            SprintCommand::Move { from, to } => self.move_node(from, to),
            SprintCommand::Indent { task_id } => self.indent(task_id),
            SprintCommand::Outdent { task_id } => self.outdent(task_id),
            SprintCommand::AddChild { parent_id, task_id } => self.add_child(parent_id, task_id),
            SprintCommand::RemoveChild { parent_id, task_id } => {
                self.remove_child(parent_id, task_id)
            }
            SprintCommand::AddDependency {
                successor_id,
                predecessor_id,
                visible,
            } => self.add_predecessor(successor_id, predecessor_id, visible),
            SprintCommand::RemoveDependency {
                successor_id,
                predecessor_id,
            } => self.remove_predecessor(successor_id, predecessor_id),
            SprintCommand::ToggleDependency {
                successor_id,
                predecessor_id,
                visible,
            } => self.toggle_predecessor(successor_id, predecessor_id, visible),
        }
    }

    /// Adds a new row.
    ///
    /// The node may name an existing story as parent; dependencies are
    /// added afterwards through [`Sprint::add_predecessor`].
    ///
    /// # Errors
    /// `Validation` if the id is taken, the parent is not a story, the
    /// node already lists predecessors, or its estimates break the
    /// milestone and range rules.
    pub fn add_task(&mut self, node: TaskNode) -> Result<TaskId> {
        self.require(SprintPhase::TasksLoaded)?;
        let mut problems = Vec::new();
        if self.store.contains(node.id) {
            problems.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", node.id),
            ));
        }
        if let Some(parent) = node.parent_id {
            if !self.store.get(parent).is_some_and(TaskNode::is_story) {
                problems.push(ValidationError::new(
                    ValidationErrorKind::InvalidParent,
                    format!("Task '{}' cannot be added under '{parent}'", node.id),
                ));
            }
        }
        if !node.predecessors.is_empty() {
            problems.push(ValidationError::new(
                ValidationErrorKind::InvalidPredecessor,
                format!("Task '{}' must be added without predecessors", node.id),
            ));
        }
        check_estimates(&node, &mut problems);
        if !problems.is_empty() {
            return Err(ScheduleError::Validation(problems));
        }

        let id = node.id;
        self.store.push(node);
        self.store.reorder_as_tree();
        self.invalidate();
        debug!(task_id = id, "task added");
        Ok(id)
    }

    /// Deletes a row, moving its children up and dropping its relations.
    pub fn remove_task(&mut self, id: TaskId) -> Result<TaskNode> {
        self.require(SprintPhase::TasksLoaded)?;
        let removed = self.store.remove_task(id)?;
        self.logged.remove(&id);
        self.invalidate();
        Ok(removed)
    }

    // ======================== Field edits ========================

    /// Renames a node. Dates are unaffected.
    pub fn rename(&mut self, id: TaskId, name: impl Into<String>) -> Result<MutationOutcome> {
        self.require(SprintPhase::TasksLoaded)?;
        let name = name.into();
        let node = self.store.node_mut(id)?;
        if node.name == name {
            return Ok(MutationOutcome::NoOp(NoOpReason::Unchanged));
        }
        node.name = name;
        node.mark_modified();
        Ok(MutationOutcome::Applied)
    }

    /// Parses `text` with the work-day grammar and stores it.
    ///
    /// # Errors
    /// `InvalidEstimate` naming the field if `text` is malformed;
    /// `Validation` if the result puts min above max. The stored value
    /// is left untouched in both cases.
    pub fn set_estimate(&mut self, id: TaskId, field: EstimateField, text: &str) -> Result<MutationOutcome> {
        self.require(SprintPhase::TasksLoaded)?;
        let value = parse_estimate(self.format, field, text)?;
        self.write_estimates("set_estimate", id, &[(field, value)])
    }

    /// Parses all four estimates of a task and stores them together.
    ///
    /// # Errors
    /// `InvalidEstimate` naming the first malformed field, or
    /// `Validation` if min ends up above max; nothing is written in
    /// either case.
    pub fn set_estimates(
        &mut self,
        id: TaskId,
        original: &str,
        remaining: &str,
        min: &str,
        max: &str,
    ) -> Result<MutationOutcome> {
        self.require(SprintPhase::TasksLoaded)?;
        let values = [
            (EstimateField::Original, parse_estimate(self.format, EstimateField::Original, original)?),
            (EstimateField::Remaining, parse_estimate(self.format, EstimateField::Remaining, remaining)?),
            (EstimateField::Min, parse_estimate(self.format, EstimateField::Min, min)?),
            (EstimateField::Max, parse_estimate(self.format, EstimateField::Max, max)?),
        ];
        self.write_estimates("set_estimates", id, &values)
    }

    // Edits a copy so a range violation leaves the stored node untouched.
    fn write_estimates(
        &mut self,
        operation: &'static str,
        id: TaskId,
        values: &[(EstimateField, WorkDuration)],
    ) -> Result<MutationOutcome> {
        let node = self.store.node(id)?;
        if !node.is_task() {
            return Ok(MutationOutcome::rejected(operation, id, NoOpReason::NotATask));
        }
        let mut edited = node.clone();
        for &(field, value) in values {
            let slot = match field {
                EstimateField::Min => &mut edited.min_estimate,
                EstimateField::Max => &mut edited.max_estimate,
                EstimateField::Original => &mut edited.original_estimate,
                EstimateField::Remaining => &mut edited.remaining_estimate,
            };
            *slot = value;
        }
        let unchanged = edited.min_estimate == node.min_estimate
            && edited.max_estimate == node.max_estimate
            && edited.original_estimate == node.original_estimate
            && edited.remaining_estimate == node.remaining_estimate;
        if unchanged {
            return Ok(MutationOutcome::NoOp(NoOpReason::Unchanged));
        }

        let mut problems = Vec::new();
        check_estimates(&edited, &mut problems);
        if !problems.is_empty() {
            return Err(ScheduleError::Validation(problems));
        }

        edited.mark_modified();
        *self.store.node_mut(id)? = edited;
        self.invalidate();
        Ok(MutationOutcome::Applied)
    }

    /// Assigns or clears a task's resource.
    ///
    /// # Errors
    /// `UnknownUser` if the user is not in the user map.
    pub fn set_resource(&mut self, id: TaskId, user: Option<UserId>) -> Result<MutationOutcome> {
        self.require(SprintPhase::TasksLoaded)?;
        if let Some(user_id) = user {
            if !self.users.contains_key(&user_id) {
                return Err(ScheduleError::UnknownUser(user_id));
            }
        }
        let node = self.store.node_mut(id)?;
        if !node.is_task() {
            return Ok(MutationOutcome::rejected("set_resource", id, NoOpReason::NotATask));
        }
        if node.resource_id == user {
            return Ok(MutationOutcome::NoOp(NoOpReason::Unchanged));
        }
        node.resource_id = user;
        node.mark_modified();
        self.invalidate();
        Ok(MutationOutcome::Applied)
    }

    /// Moves a milestone's fixed date.
    pub fn set_milestone_start(&mut self, id: TaskId, start: NaiveDateTime) -> Result<MutationOutcome> {
        self.require(SprintPhase::TasksLoaded)?;
        let node = self.store.node_mut(id)?;
        if !node.is_milestone() {
            return Ok(MutationOutcome::rejected(
                "set_milestone_start",
                id,
                NoOpReason::NotAMilestone,
            ));
        }
        if node.start == Some(start) {
            return Ok(MutationOutcome::NoOp(NoOpReason::Unchanged));
        }
        node.start = Some(start);
        node.end = Some(start);
        node.mark_modified();
        self.invalidate();
        Ok(MutationOutcome::Applied)
    }

    // ======================== Accessors ========================

    pub fn id(&self) -> SprintId {
        self.header.id
    }

    pub fn header(&self) -> &SprintHeader {
        &self.header
    }

    pub fn status(&self) -> SprintStatus {
        self.header.status
    }

    pub fn phase(&self) -> SprintPhase {
        self.phase
    }

    /// Instant of the last recalculation.
    pub fn as_of(&self) -> Option<NaiveDateTime> {
        self.as_of
    }

    pub fn is_leveled(&self) -> bool {
        self.leveled
    }

    /// Sprint aggregates; meaningful only when calculated.
    pub fn totals(&self) -> &SprintTotals {
        &self.totals
    }

    /// Tasks the last recalculation could not fit into the calendar
    /// horizon.
    pub fn unplaced(&self) -> &[TaskId] {
        &self.unplaced
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.totals.start
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.totals.end
    }

    pub fn original_estimation(&self) -> WorkDuration {
        self.totals.original_estimation
    }

    pub fn worked(&self) -> WorkDuration {
        self.totals.worked
    }

    pub fn remaining(&self) -> WorkDuration {
        self.totals.remaining
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskNode> {
        self.store.get(id)
    }

    /// Nodes in order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.store.iter()
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn users(&self) -> &HashMap<UserId, User> {
        &self.users
    }

    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    pub fn duration_format(&self) -> WorkDayFormat {
        self.format
    }

    /// Formats an effort with this sprint's work day.
    pub fn format_duration(&self, duration: WorkDuration) -> String {
        self.format.format(duration)
    }

    /// Visible predecessors of `id` as shown in a dependency column:
    /// keys (ids for unkeyed nodes) joined by ", ".
    pub fn dependency_text(&self, id: TaskId) -> Result<String> {
        let node = self.store.node(id)?;
        let labels: Vec<String> = node
            .predecessors
            .iter()
            .filter(|r| r.visible)
            .map(|r| match self.store.get(r.predecessor_id) {
                Some(p) if !p.key.is_empty() => p.key.clone(),
                _ => r.predecessor_id.to_string(),
            })
            .collect();
        Ok(labels.join(", "))
    }

    /// Ids of nodes changed since the last hand-off, in order.
    pub fn modified_ids(&self) -> Vec<TaskId> {
        self.store.modified_ids()
    }

    /// Hands changed nodes to persistence and clears their flags.
    pub fn take_modified(&mut self) -> Vec<TaskNode> {
        let ids = self.store.take_modified();
        ids.iter()
            .filter_map(|&id| self.store.get(id).cloned())
            .collect()
    }

    // ======================== Internals ========================

    fn mutate<F>(&mut self, f: F) -> Result<MutationOutcome>
    where
        F: FnOnce(&mut TaskStore) -> Result<MutationOutcome>,
    {
        self.require(SprintPhase::TasksLoaded)?;
        let outcome = f(&mut self.store)?;
        if outcome.is_applied() {
            self.invalidate();
        }
        Ok(outcome)
    }

    fn invalidate(&mut self) {
        if self.phase == SprintPhase::Calculated {
            self.phase = SprintPhase::TasksLoaded;
        }
        self.leveled = false;
    }

    fn require(&self, minimum: SprintPhase) -> Result<()> {
        if self.phase < minimum {
            return Err(ScheduleError::Lifecycle {
                expected: minimum.as_str(),
                actual: self.phase.as_str(),
            });
        }
        Ok(())
    }

    fn require_exact(&self, phase: SprintPhase) -> Result<()> {
        if self.phase != phase {
            return Err(ScheduleError::Lifecycle {
                expected: phase.as_str(),
                actual: self.phase.as_str(),
            });
        }
        Ok(())
    }
}

fn parse_estimate(format: WorkDayFormat, field: EstimateField, text: &str) -> Result<WorkDuration> {
    format
        .parse(text)
        .map_err(|source| ScheduleError::InvalidEstimate {
            field: field.as_str(),
            source,
        })
}
