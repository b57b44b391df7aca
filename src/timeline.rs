//! Off-thread timeline generation.
//!
//! Turning a calculated sprint into chart rows can be slow for large
//! sprints, so it runs on the blocking pool. Requests supersede each
//! other: a new request cancels the one in flight, whose callback never
//! fires and whose receiver yields `None`.
//!
//! Generation works on a [`TimelineSnapshot`], an owned copy of the
//! sprint, so the interactive side may keep mutating its sprint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ScheduleError};
use crate::models::{TaskId, TaskKind, TaskNode, UserId};
use crate::sprint::{Sprint, SprintPhase};

/// One bar of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub task_id: TaskId,
    pub key: String,
    pub name: String,
    pub kind: TaskKind,
    /// Nesting level; roots are 0.
    pub depth: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Assignee display name.
    pub resource: Option<String>,
}

/// Owned copy of what generation needs.
#[derive(Debug, Clone)]
pub struct TimelineSnapshot {
    nodes: Vec<TaskNode>,
    user_names: HashMap<UserId, String>,
}

impl TimelineSnapshot {
    /// Captures a calculated sprint.
    ///
    /// # Errors
    /// `Lifecycle` if the sprint's dates are stale.
    pub fn capture(sprint: &Sprint) -> Result<Self> {
        if !sprint.is_calculated() {
            return Err(ScheduleError::Lifecycle {
                expected: SprintPhase::Calculated.as_str(),
                actual: sprint.phase().as_str(),
            });
        }
        Ok(Self {
            nodes: sprint.tasks().cloned().collect(),
            user_names: sprint
                .users()
                .values()
                .map(|u| (u.id, u.name.clone()))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds the rows, or `None` once `cancel` fires.
    pub fn rows(&self, cancel: &CancellationToken) -> Option<Vec<TimelineRow>> {
        let parents: HashMap<TaskId, Option<TaskId>> =
            self.nodes.iter().map(|n| (n.id, n.parent_id)).collect();
        let mut depths: HashMap<TaskId, usize> = HashMap::new();
        let mut rows = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if cancel.is_cancelled() {
                return None;
            }
            let depth = match node.parent_id.and_then(|p| depths.get(&p)) {
                Some(&parent_depth) => parent_depth + 1,
                None => chain_depth(node.id, &parents),
            };
            depths.insert(node.id, depth);
            rows.push(TimelineRow {
                task_id: node.id,
                key: node.key.clone(),
                name: node.name.clone(),
                kind: node.kind,
                depth,
                start: node.start,
                end: node.end,
                resource: node
                    .resource_id
                    .and_then(|id| self.user_names.get(&id).cloned()),
            });
        }
        Some(rows)
    }
}

fn chain_depth(id: TaskId, parents: &HashMap<TaskId, Option<TaskId>>) -> usize {
    let mut depth = 0;
    let mut current = parents.get(&id).copied().flatten();
    while let Some(parent) = current {
        depth += 1;
        if depth > parents.len() {
            break;
        }
        current = parents.get(&parent).copied().flatten();
    }
    depth
}

/// Runs supersedable generations on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct TimelineGenerator {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl TimelineGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a generation, cancelling any still in flight.
    ///
    /// `on_ready` runs on the blocking pool once rows are built and the
    /// request is still current. The receiver yields the rows, or `None`
    /// if the request was superseded or cancelled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn request<F>(
        &self,
        snapshot: TimelineSnapshot,
        on_ready: F,
    ) -> oneshot::Receiver<Option<Vec<TimelineRow>>>
    where
        F: FnOnce(&[TimelineRow]) + Send + 'static,
    {
        let token = self.begin();
        Self::spawn(snapshot, token, on_ready)
    }

    /// Registers a new current request and cancels the previous one.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.swap(Some(token.clone())) {
            debug!("superseding timeline generation");
            previous.cancel();
        }
        token
    }

    fn spawn<F>(
        snapshot: TimelineSnapshot,
        token: CancellationToken,
        on_ready: F,
    ) -> oneshot::Receiver<Option<Vec<TimelineRow>>>
    where
        F: FnOnce(&[TimelineRow]) + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let rows = snapshot.rows(&token).filter(|_| !token.is_cancelled());
            if let Some(rows) = &rows {
                on_ready(rows);
            }
            let _ = tx.send(rows);
        });
        rx
    }

    /// Cancels the generation in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.swap(None) {
            token.cancel();
        }
    }

    fn swap(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *current, next)
    }
}
