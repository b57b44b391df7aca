//! Order model: dense total order over all nodes of a sprint.

use std::collections::HashMap;

use tracing::debug;

use super::{MutationOutcome, NoOpReason, TaskStore};
use crate::models::TaskId;

impl TaskStore {
    /// Moves the node at `from` to `to` and renumbers every node.
    ///
    /// A flat list operation: hierarchy is not consulted. No-op when the
    /// indices are equal or either is out of range.
    pub fn move_node(&mut self, from: usize, to: usize) -> MutationOutcome {
        let len = self.len();
        if from == to || from >= len || to >= len {
            debug!(from, to, len, "move ignored");
            return MutationOutcome::NoOp(NoOpReason::InvalidIndex);
        }

        let mut order = self.ordered_ids().to_vec();
        let id = order.remove(from);
        order.insert(to, id);
        self.set_order(order);
        let touched = self.renumber();
        debug!(task_id = id, from, to, touched, "moved node");
        MutationOutcome::Applied
    }

    /// Re-establishes tree order: depth-first pre-order with siblings in
    /// their current relative order, then renumbers.
    ///
    /// Nodes whose parent is missing are treated as roots so nothing is
    /// dropped from the order.
    pub(crate) fn reorder_as_tree(&mut self) -> usize {
        let current = self.ordered_ids().to_vec();
        let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut roots = Vec::new();
        for &id in &current {
            match self.get(id).and_then(|n| n.parent_id) {
                Some(parent) if self.contains(parent) => {
                    children.entry(parent).or_default().push(id)
                }
                _ => roots.push(id),
            }
        }

        let mut order = Vec::with_capacity(current.len());
        let mut stack: Vec<TaskId> = roots.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if order.len() == current.len() {
                break;
            }
            order.push(id);
            if let Some(kids) = children.get(&id) {
                stack.extend(kids.iter().rev());
            }
        }

        // A hierarchy cycle leaves nodes unreachable from any root.
        if order.len() < current.len() {
            let placed: std::collections::HashSet<TaskId> = order.iter().copied().collect();
            order.extend(current.iter().filter(|id| !placed.contains(id)));
        }

        self.set_order(order);
        self.renumber()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskNode;

    fn flat(n: u64) -> TaskStore {
        TaskStore::from_nodes((0..n).map(|i| TaskNode::task(i).with_order(i as usize)).collect())
    }

    fn assert_dense(store: &TaskStore) {
        for (i, node) in store.iter().enumerate() {
            assert_eq!(node.order_id, i);
        }
    }

    #[test]
    fn test_move_forward() {
        let mut store = flat(5);
        assert!(store.move_node(1, 3).is_applied());
        assert_eq!(store.ordered_ids(), &[0, 2, 3, 1, 4]);
        assert_dense(&store);
        assert_eq!(store.modified_ids(), vec![2, 3, 1]);
    }

    #[test]
    fn test_move_backward() {
        let mut store = flat(4);
        assert!(store.move_node(3, 0).is_applied());
        assert_eq!(store.ordered_ids(), &[3, 0, 1, 2]);
        assert_dense(&store);
    }

    #[test]
    fn test_move_invalid_is_noop() {
        let mut store = flat(3);
        for (from, to) in [(1, 1), (3, 0), (0, 3), (usize::MAX, 0)] {
            assert_eq!(
                store.move_node(from, to),
                MutationOutcome::NoOp(NoOpReason::InvalidIndex)
            );
        }
        assert_eq!(store.ordered_ids(), &[0, 1, 2]);
        assert!(store.modified_ids().is_empty());
    }

    #[test]
    fn test_many_moves_stay_dense() {
        let mut store = flat(7);
        let moves = [(0, 6), (5, 1), (2, 2), (6, 0), (3, 4), (1, 5), (4, 3)];
        for (from, to) in moves {
            store.move_node(from, to);
            assert_dense(&store);
        }
        let mut ids = store.ordered_ids().to_vec();
        ids.sort_unstable();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_reorder_as_tree_groups_children() {
        // order: S, X, C (child of S)  →  S, C, X
        let mut store = TaskStore::from_nodes(vec![
            TaskNode::story(1).with_order(0),
            TaskNode::task(2).with_order(1),
            TaskNode::task(3).with_order(2).with_parent(1),
        ]);
        store.reorder_as_tree();
        assert_eq!(store.ordered_ids(), &[1, 3, 2]);
        assert_dense(&store);
    }
}
