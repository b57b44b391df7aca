//! Hierarchy graph: single-parent tree of stories.
//!
//! Only stories may be parents and no node may become its own
//! ancestor. Every successful change ends with the order model being
//! rebuilt in tree order, so a story is always followed by its subtree.

use tracing::{debug, info};

use super::effective::{check_overlay, GraphView, Overlay};
use super::{MutationOutcome, NoOpReason, TaskStore};
use crate::error::Result;
use crate::models::{TaskId, TaskNode};

impl TaskStore {
    /// Parent of `id`, if any.
    pub fn parent_of(&self, id: TaskId) -> Option<TaskId> {
        self.get(id).and_then(|n| n.parent_id)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: TaskId) -> Vec<TaskId> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if chain.contains(&parent) || chain.len() > self.len() {
                break;
            }
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    /// Whether `a` is a proper ancestor of `b`.
    pub fn is_ancestor_of(&self, a: TaskId, b: TaskId) -> bool {
        self.ancestors(b).contains(&a)
    }

    /// Whether `a` is a proper descendant of `b`.
    pub fn is_descendant_of(&self, a: TaskId, b: TaskId) -> bool {
        self.is_ancestor_of(b, a)
    }

    /// Direct children of `id`, in order.
    pub fn children(&self, id: TaskId) -> Vec<TaskId> {
        self.iter()
            .filter(|n| n.parent_id == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// Tasks and milestones in the subtree of `id`; `[id]` for a leaf.
    pub fn leaves_of(&self, id: TaskId) -> Vec<TaskId> {
        GraphView::new(self, Overlay::default()).leaves_of(id)
    }

    /// Whether `candidate` may become the parent of `node`.
    pub fn is_eligible_parent(&self, candidate: TaskId, node: TaskId) -> bool {
        self.parent_rejection(candidate, node).is_none()
    }

    fn parent_rejection(&self, candidate: TaskId, node: TaskId) -> Option<NoOpReason> {
        if candidate == node {
            return Some(NoOpReason::SelfReference);
        }
        if !self.get(candidate).is_some_and(TaskNode::is_story) {
            return Some(NoOpReason::NotAStory);
        }
        if self.is_descendant_of(candidate, node) {
            return Some(NoOpReason::CreatesHierarchyCycle);
        }
        None
    }

    /// Makes `node` a child of story `parent`.
    ///
    /// # Errors
    /// `UnknownTask` if either id is missing. Ineligible targets, an
    /// existing link, or a resulting dependency conflict are no-ops.
    pub fn add_child(&mut self, parent: TaskId, node: TaskId) -> Result<MutationOutcome> {
        self.node(parent)?;
        self.node(node)?;
        if let Some(reason) = self.parent_rejection(parent, node) {
            return Ok(MutationOutcome::rejected("add_child", node, reason));
        }
        if self.parent_of(node) == Some(parent) {
            return Ok(MutationOutcome::rejected(
                "add_child",
                node,
                NoOpReason::AlreadyPresent,
            ));
        }
        self.reparent_checked("add_child", node, Some(parent))
    }

    /// Detaches `node` from `parent`, making it a root.
    pub fn remove_child(&mut self, parent: TaskId, node: TaskId) -> Result<MutationOutcome> {
        self.node(parent)?;
        self.node(node)?;
        if self.parent_of(node) != Some(parent) {
            return Ok(MutationOutcome::rejected(
                "remove_child",
                node,
                NoOpReason::NotPresent,
            ));
        }
        // Leaving a subtree only drops effective edges.
        self.commit_parent(node, None);
        Ok(MutationOutcome::Applied)
    }

    /// Moves `node` under the nearest preceding story on its level.
    pub fn indent(&mut self, node: TaskId) -> Result<MutationOutcome> {
        let current = self.node(node)?.parent_id;
        let position = self.position(node).unwrap_or(0);
        let target = self.ordered_ids()[..position]
            .iter()
            .rev()
            .copied()
            .find(|&id| {
                self.get(id)
                    .is_some_and(|n| n.is_story() && n.parent_id == current)
            });

        let Some(target) = target else {
            info!(task_id = node, "indent: no preceding story on the same level");
            return Ok(MutationOutcome::NoOp(NoOpReason::NoEligibleParent));
        };
        if let Some(reason) = self.parent_rejection(target, node) {
            return Ok(MutationOutcome::rejected("indent", node, reason));
        }
        self.reparent_checked("indent", node, Some(target))
    }

    /// Promotes `node` to a sibling of its parent.
    pub fn outdent(&mut self, node: TaskId) -> Result<MutationOutcome> {
        let Some(parent) = self.node(node)?.parent_id else {
            info!(task_id = node, "outdent: node is already a root");
            return Ok(MutationOutcome::NoOp(NoOpReason::NoParent));
        };
        let grandparent = self.parent_of(parent);
        self.commit_parent(node, grandparent);
        Ok(MutationOutcome::Applied)
    }

    /// Deletes a node.
    ///
    /// Its children move up to its parent and every relation naming it is
    /// dropped. The order is rebuilt and the removed node returned.
    pub fn remove_task(&mut self, id: TaskId) -> Result<TaskNode> {
        let parent = self.node(id)?.parent_id;

        for node in self.nodes_mut() {
            if node.parent_id == Some(id) {
                node.parent_id = parent;
                node.mark_modified();
            }
            let before = node.predecessors.len();
            node.predecessors.retain(|r| r.predecessor_id != id);
            if node.predecessors.len() != before {
                node.mark_modified();
            }
        }

        let removed = self.node(id)?.clone();
        self.detach(id);
        let touched = self.reorder_as_tree();
        info!(task_id = id, touched, "removed task");
        Ok(removed)
    }

    fn reparent_checked(
        &mut self,
        operation: &'static str,
        node: TaskId,
        parent: Option<TaskId>,
    ) -> Result<MutationOutcome> {
        if let Some(reason) = check_overlay(self, Overlay::reparent(node, parent))? {
            return Ok(MutationOutcome::rejected(operation, node, reason));
        }
        self.commit_parent(node, parent);
        Ok(MutationOutcome::Applied)
    }

    fn commit_parent(&mut self, node: TaskId, parent: Option<TaskId>) {
        if let Some(n) = self.get_mut(node) {
            n.parent_id = parent;
            n.mark_modified();
        }
        let touched = self.reorder_as_tree();
        debug!(task_id = node, ?parent, touched, "reparented");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkDuration;

    /// S1, A(S1), B(S1), S2, C
    fn sample() -> TaskStore {
        TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::task(2).with_order(1).with_parent(1),
            TaskNode::task(3).with_order(2).with_parent(1),
            TaskNode::story(4).with_order(3),
            TaskNode::task(5).with_order(4),
        ])
    }

    #[test]
    fn test_ancestry() {
        let mut s = sample();
        s.add_child(4, 1).unwrap();
        assert_eq!(s.ancestors(2), vec![1, 4]);
        assert!(s.is_ancestor_of(4, 2));
        assert!(s.is_descendant_of(2, 4));
        assert!(!s.is_ancestor_of(2, 4));
        assert!(!s.is_ancestor_of(2, 2));
    }

    #[test]
    fn test_eligible_parent() {
        let s = sample();
        assert!(s.is_eligible_parent(4, 5));
        assert!(!s.is_eligible_parent(5, 2));
        assert!(!s.is_eligible_parent(1, 1));
        assert_eq!(s.parent_rejection(1, 1), Some(NoOpReason::SelfReference));
        assert_eq!(s.parent_rejection(2, 5), Some(NoOpReason::NotAStory));
    }

    #[test]
    fn test_add_child_rejects_cycle() {
        let mut s = sample();
        assert!(s.add_child(1, 4).unwrap().is_applied());
        assert_eq!(
            s.add_child(4, 1).unwrap(),
            MutationOutcome::NoOp(NoOpReason::CreatesHierarchyCycle)
        );
        assert_eq!(
            s.add_child(1, 4).unwrap(),
            MutationOutcome::NoOp(NoOpReason::AlreadyPresent)
        );
    }

    #[test]
    fn test_add_child_reorders_subtree() {
        let mut s = sample();
        s.add_child(1, 5).unwrap();
        assert_eq!(s.ordered_ids(), &[1, 2, 3, 5, 4]);
        assert_eq!(s.node(5).unwrap().order_id, 3);
        assert!(s.node(5).unwrap().modified);
        assert!(s.node(4).unwrap().modified);
    }

    #[test]
    fn test_add_child_unknown_is_error() {
        let mut s = sample();
        assert!(s.add_child(1, 42).is_err());
    }

    #[test]
    fn test_remove_child() {
        let mut s = sample();
        assert!(s.remove_child(1, 3).unwrap().is_applied());
        assert_eq!(s.parent_of(3), None);
        assert_eq!(
            s.remove_child(1, 5).unwrap(),
            MutationOutcome::NoOp(NoOpReason::NotPresent)
        );
    }

    #[test]
    fn test_indent_under_preceding_story() {
        let mut s = sample();
        assert!(s.indent(5).unwrap().is_applied());
        assert_eq!(s.parent_of(5), Some(4));
    }

    #[test]
    fn test_indent_skips_other_levels() {
        // B's preceding same-level nodes are only A (a task): no target.
        let mut s = sample();
        let before: Vec<_> = s.iter().map(|n| (n.id, n.order_id, n.parent_id)).collect();
        assert_eq!(
            s.indent(3).unwrap(),
            MutationOutcome::NoOp(NoOpReason::NoEligibleParent)
        );
        let after: Vec<_> = s.iter().map(|n| (n.id, n.order_id, n.parent_id)).collect();
        assert_eq!(before, after);
        assert!(s.modified_ids().is_empty());
    }

    #[test]
    fn test_indent_first_node_is_noop() {
        let mut s = sample();
        assert_eq!(
            s.indent(1).unwrap(),
            MutationOutcome::NoOp(NoOpReason::NoEligibleParent)
        );
    }

    #[test]
    fn test_indent_rejected_by_dependency() {
        // C depends on S2; moving C into S2 would link it with its own parent.
        let mut s = sample();
        s.get_mut(5).unwrap().predecessors.push(crate::models::Relation::new(4, 5, true));
        assert_eq!(
            s.indent(5).unwrap(),
            MutationOutcome::NoOp(NoOpReason::SameSubtree)
        );
        assert_eq!(s.parent_of(5), None);
    }

    #[test]
    fn test_outdent() {
        let mut s = sample();
        s.add_child(4, 1).unwrap();
        assert!(s.outdent(2).unwrap().is_applied());
        assert_eq!(s.parent_of(2), Some(4));
        assert!(s.outdent(2).unwrap().is_applied());
        assert_eq!(s.parent_of(2), None);
        assert_eq!(
            s.outdent(2).unwrap(),
            MutationOutcome::NoOp(NoOpReason::NoParent)
        );
    }

    #[test]
    fn test_remove_task_cascades() {
        let mut s = TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::story(2).with_order(1).with_parent(1),
            TaskNode::task(3)
                .with_order(2)
                .with_parent(2)
                .with_estimate(WorkDuration::from_hours(1)),
            TaskNode::task(4).with_order(3).with_predecessor(2),
        ]);
        let removed = s.remove_task(2).unwrap();
        assert_eq!(removed.id, 2);
        assert!(!s.contains(2));
        assert_eq!(s.parent_of(3), Some(1));
        assert!(s.node(4).unwrap().predecessors.is_empty());
        assert_eq!(s.ordered_ids(), &[1, 3, 4]);
        for (i, n) in s.iter().enumerate() {
            assert_eq!(n.order_id, i);
        }
    }
}
