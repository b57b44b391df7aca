//! Input validation for loaded sprint data.
//!
//! Checks structural integrity of task records, users and worklogs
//! before a sprint's graphs are built. Detects:
//! - Duplicate IDs
//! - Dangling or non-story parent references
//! - Dangling, self or subtree predecessor references
//! - Cycles in the hierarchy and in the effective dependency graph
//! - Milestones without a start or with an own estimate
//! - Worklogs for unknown tasks
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{HashMap, HashSet};

use crate::graph::{EffectiveGraph, TaskStore};
use crate::models::{TaskId, TaskNode, User, Worklog};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A parent reference is dangling or names a non-story.
    InvalidParent,
    /// A predecessor reference points to a missing task.
    InvalidPredecessor,
    /// A task lists itself as predecessor.
    SelfDependency,
    /// A relation links a node with its own ancestor or descendant.
    SubtreeDependency,
    /// The parent chain loops.
    CyclicHierarchy,
    /// The effective dependency graph contains a cycle.
    CyclicDependency,
    /// An estimate on a node that cannot carry one, or min above max.
    InvalidEstimate,
    /// A milestone has no start date.
    MissingMilestoneStart,
    /// A worklog references a missing task.
    UnknownWorklogTask,
}

impl ValidationError {
    pub(crate) fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validates the records of one sprint.
///
/// Checks:
/// 1. No duplicate task or user IDs
/// 2. Every parent exists and is a story
/// 3. Every predecessor exists, is not the task itself and is not in
///    the task's own subtree or ancestry
/// 4. Milestones have a start and no estimate; tasks have `min <= max`
/// 5. Every worklog names an existing task
/// 6. No cycles in the hierarchy
/// 7. No cycles in the effective dependency graph (only checked when
///    checks 1–6 pass)
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_sprint(tasks: &[TaskNode], users: &[User], worklogs: &[Worklog]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut user_ids = HashSet::new();
    for user in users {
        if !user_ids.insert(user.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate user ID: {}", user.id),
            ));
        }
    }

    let mut by_id: HashMap<TaskId, &TaskNode> = HashMap::new();
    for task in tasks {
        if by_id.insert(task.id, task).is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", task.id),
            ));
        }
    }

    for task in tasks {
        check_parent(task, &by_id, &mut errors);
        check_estimates(task, &mut errors);
        for relation in &task.predecessors {
            let pred = relation.predecessor_id;
            if pred == task.id {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SelfDependency,
                    format!("Task '{}' lists itself as predecessor", task.id),
                ));
            } else if !by_id.contains_key(&pred) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidPredecessor,
                    format!("Task '{}' references unknown predecessor '{pred}'", task.id),
                ));
            }
        }
    }

    for log in worklogs {
        if !by_id.contains_key(&log.task_id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownWorklogTask,
                format!("Worklog references unknown task '{}'", log.task_id),
            ));
        }
    }

    if let Some(cycle_err) = detect_hierarchy_cycle(tasks, &by_id) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        errors.extend(check_dependencies(tasks, &by_id));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_parent(task: &TaskNode, by_id: &HashMap<TaskId, &TaskNode>, errors: &mut Vec<ValidationError>) {
    let Some(parent) = task.parent_id else {
        return;
    };
    if parent == task.id {
        errors.push(ValidationError::new(
            ValidationErrorKind::CyclicHierarchy,
            format!("Task '{}' is its own parent", task.id),
        ));
        return;
    }
    match by_id.get(&parent) {
        None => errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParent,
            format!("Task '{}' references unknown parent '{parent}'", task.id),
        )),
        Some(p) if !p.is_story() => errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParent,
            format!(
                "Task '{}' has parent '{parent}' of kind {}",
                task.id,
                p.kind.as_str()
            ),
        )),
        Some(_) => {}
    }
}

/// Milestone start and estimate rules for one node.
///
/// Story estimates are overwritten by aggregation and are not checked.
pub(crate) fn check_estimates(task: &TaskNode, errors: &mut Vec<ValidationError>) {
    if task.is_milestone() {
        if task.start.is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingMilestoneStart,
                format!("Milestone '{}' has no start", task.id),
            ));
        }
        let carries_estimate = !(task.original_estimate.is_zero()
            && task.remaining_estimate.is_zero()
            && task.min_estimate.is_zero()
            && task.max_estimate.is_zero());
        if carries_estimate {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidEstimate,
                format!("Milestone '{}' carries an estimate", task.id),
            ));
        }
    } else if task.is_task() && !task.max_estimate.is_zero() && task.min_estimate > task.max_estimate {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidEstimate,
            format!("Task '{}' has min estimate above max estimate", task.id),
        ));
    }
}

/// Detects a loop in the parent chains.
///
/// Each chain is walked with a visited set; a chain that revisits one
/// of its own nodes is a cycle.
fn detect_hierarchy_cycle(
    tasks: &[TaskNode],
    by_id: &HashMap<TaskId, &TaskNode>,
) -> Option<ValidationError> {
    let mut cleared: HashSet<TaskId> = HashSet::new();
    for task in tasks {
        let mut chain = HashSet::new();
        let mut current = Some(task.id);
        while let Some(id) = current {
            if cleared.contains(&id) {
                break;
            }
            if !chain.insert(id) {
                return Some(ValidationError::new(
                    ValidationErrorKind::CyclicHierarchy,
                    format!("Circular hierarchy detected involving task '{id}'"),
                ));
            }
            current = by_id.get(&id).and_then(|n| n.parent_id);
        }
        cleared.extend(chain);
    }
    None
}

fn check_dependencies(tasks: &[TaskNode], by_id: &HashMap<TaskId, &TaskNode>) -> Vec<ValidationError> {
    let store = TaskStore::from_nodes(tasks.to_vec());

    let mut errors = Vec::new();
    for task in tasks {
        for relation in &task.predecessors {
            let pred = relation.predecessor_id;
            if by_id.contains_key(&pred)
                && (store.is_ancestor_of(pred, task.id) || store.is_ancestor_of(task.id, pred))
            {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SubtreeDependency,
                    format!("Task '{}' depends on '{pred}' in its own subtree", task.id),
                ));
            }
        }
    }

    if errors.is_empty() {
        if let Err(err) = EffectiveGraph::build(&store) {
            errors.push(ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!("Circular dependency detected: {err}"),
            ));
        }
    }
    errors
}
