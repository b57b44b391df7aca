//! Dependency graph: predecessor → successor relations.
//!
//! Relations live on the successor's `predecessors` list. They never
//! link a node with itself or with its own subtree, never duplicate a
//! pair, and never close a cycle in the effective leaf graph.

use tracing::debug;

use super::effective::{check_overlay, Overlay};
use super::{MutationOutcome, NoOpReason, TaskStore};
use crate::error::{Result, ScheduleError};
use crate::models::{Relation, TaskId};

impl TaskStore {
    /// Whether `predecessor` may be added as a predecessor of `dependent`,
    /// judged on the hierarchy alone.
    pub fn is_eligible_predecessor(&self, predecessor: TaskId, dependent: TaskId) -> bool {
        self.predecessor_rejection(predecessor, dependent).is_none()
    }

    fn predecessor_rejection(&self, predecessor: TaskId, dependent: TaskId) -> Option<NoOpReason> {
        if predecessor == dependent {
            Some(NoOpReason::SelfReference)
        } else if self.is_descendant_of(predecessor, dependent)
            || self.is_descendant_of(dependent, predecessor)
        {
            Some(NoOpReason::SameSubtree)
        } else {
            None
        }
    }

    /// Adds `predecessor → successor`.
    ///
    /// # Errors
    /// `UnknownTask` if either id is missing. Self-links, subtree links,
    /// duplicates and cycles are no-ops.
    pub fn add_predecessor(
        &mut self,
        successor: TaskId,
        predecessor: TaskId,
        visible: bool,
    ) -> Result<MutationOutcome> {
        self.node(predecessor)?;
        let has_edge = self.node(successor)?.has_predecessor(predecessor);
        if let Some(reason) = self.predecessor_rejection(predecessor, successor) {
            return Ok(MutationOutcome::rejected("add_predecessor", successor, reason));
        }
        if has_edge {
            return Ok(MutationOutcome::rejected(
                "add_predecessor",
                successor,
                NoOpReason::AlreadyPresent,
            ));
        }

        let relation = Relation::new(predecessor, successor, visible);
        if let Some(reason) = check_overlay(self, Overlay::relation(relation))? {
            return Ok(MutationOutcome::rejected("add_predecessor", successor, reason));
        }

        let node = self.node_mut(successor)?;
        node.predecessors.push(relation);
        node.mark_modified();
        debug!(successor, predecessor, visible, "added predecessor");
        Ok(MutationOutcome::Applied)
    }

    /// Removes `predecessor → successor`.
    pub fn remove_predecessor(
        &mut self,
        successor: TaskId,
        predecessor: TaskId,
    ) -> Result<MutationOutcome> {
        self.node(predecessor)?;
        let node = self.node_mut(successor)?;
        if !node.has_predecessor(predecessor) {
            return Ok(MutationOutcome::rejected(
                "remove_predecessor",
                successor,
                NoOpReason::NotPresent,
            ));
        }
        node.predecessors.retain(|r| r.predecessor_id != predecessor);
        node.mark_modified();
        debug!(successor, predecessor, "removed predecessor");
        Ok(MutationOutcome::Applied)
    }

    /// Drop-onto gesture: removes the relation if present, adds it otherwise.
    pub fn toggle_predecessor(
        &mut self,
        successor: TaskId,
        predecessor: TaskId,
        visible: bool,
    ) -> Result<MutationOutcome> {
        if self.node(successor)?.has_predecessor(predecessor) {
            self.remove_predecessor(successor, predecessor)
        } else {
            self.add_predecessor(successor, predecessor, visible)
        }
    }

    /// Verifies every id reference in the store.
    ///
    /// # Errors
    /// `Integrity` on the first dangling parent or predecessor, a
    /// non-story parent, or a relation filed under the wrong successor.
    pub fn check_integrity(&self) -> Result<()> {
        for node in self.iter() {
            if let Some(parent) = node.parent_id {
                match self.get(parent) {
                    None => {
                        return Err(ScheduleError::Integrity(format!(
                            "task {} references unknown parent {parent}",
                            node.id
                        )))
                    }
                    Some(p) if !p.is_story() => {
                        return Err(ScheduleError::Integrity(format!(
                            "task {} has non-story parent {parent}",
                            node.id
                        )))
                    }
                    Some(_) => {}
                }
            }
            for relation in &node.predecessors {
                if relation.successor_id != node.id {
                    return Err(ScheduleError::Integrity(format!(
                        "relation {} -> {} is stored on task {}",
                        relation.predecessor_id, relation.successor_id, node.id
                    )));
                }
                if !self.contains(relation.predecessor_id) {
                    return Err(ScheduleError::Integrity(format!(
                        "task {} references unknown predecessor {}",
                        node.id, relation.predecessor_id
                    )));
                }
            }
        }
        Ok(())
    }
}
