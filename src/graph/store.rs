//! Flat task node store (arena + index).

use std::collections::HashMap;

use crate::error::{Result, ScheduleError};
use crate::models::{TaskId, TaskNode};

/// All task nodes of one sprint, keyed by id, plus their total order.
///
/// `order[i]` is the id of the node whose `order_id` is `i`; the two are
/// kept in step by [`TaskStore::renumber`].
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    nodes: HashMap<TaskId, TaskNode>,
    order: Vec<TaskId>,
}

impl TaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from loaded records.
    ///
    /// Nodes are ordered by their stored `order_id` (ties by id) and then
    /// renumbered densely; nodes whose position changed are marked
    /// modified. Duplicate ids must be rejected before this point.
    pub fn from_nodes(nodes: Vec<TaskNode>) -> Self {
        let mut sorted: Vec<(usize, TaskId)> = nodes.iter().map(|n| (n.order_id, n.id)).collect();
        sorted.sort_unstable();

        let mut store = Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            order: sorted.into_iter().map(|(_, id)| id).collect(),
        };
        store.renumber();
        store
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&id)
    }

    /// Looks up a node, failing with `UnknownTask`.
    pub fn node(&self, id: TaskId) -> Result<&TaskNode> {
        self.nodes.get(&id).ok_or(ScheduleError::UnknownTask(id))
    }

    /// Mutable lookup, failing with `UnknownTask`.
    pub fn node_mut(&mut self, id: TaskId) -> Result<&mut TaskNode> {
        self.nodes.get_mut(&id).ok_or(ScheduleError::UnknownTask(id))
    }

    /// Node ids in order.
    pub fn ordered_ids(&self) -> &[TaskId] {
        &self.order
    }

    /// Nodes in order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut TaskNode> {
        self.nodes.values_mut()
    }

    /// Position of a node in the order.
    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.nodes
            .get(&id)
            .map(|n| n.order_id)
            .filter(|&pos| self.order.get(pos) == Some(&id))
            .or_else(|| self.order.iter().position(|&o| o == id))
    }

    /// Appends a node at the end of the order.
    pub fn push(&mut self, mut node: TaskNode) {
        node.order_id = self.order.len();
        node.mark_modified();
        self.order.push(node.id);
        self.nodes.insert(node.id, node);
    }

    /// Removes a node without touching anything that references it.
    pub(crate) fn detach(&mut self, id: TaskId) -> Option<TaskNode> {
        let node = self.nodes.remove(&id)?;
        self.order.retain(|&o| o != id);
        Some(node)
    }

    pub(crate) fn set_order(&mut self, order: Vec<TaskId>) {
        self.order = order;
    }

    /// Writes each node's position into its `order_id`.
    ///
    /// Returns the number of nodes whose `order_id` changed; those are
    /// marked modified.
    pub fn renumber(&mut self) -> usize {
        let mut touched = 0;
        for (index, id) in self.order.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(id) {
                if node.order_id != index {
                    node.order_id = index;
                    node.mark_modified();
                    touched += 1;
                }
            }
        }
        touched
    }

    /// Ids of nodes flagged for persistence, in order.
    pub fn modified_ids(&self) -> Vec<TaskId> {
        self.iter().filter(|n| n.modified).map(|n| n.id).collect()
    }

    /// Clears every modified flag, returning the ids that were set.
    pub fn take_modified(&mut self) -> Vec<TaskId> {
        let ids = self.modified_ids();
        for id in &ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.modified = false;
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nodes_sorts_and_densifies() {
        let store = TaskStore::from_nodes(vec![
            TaskNode::task(1).with_order(10),
            TaskNode::task(2).with_order(3),
            TaskNode::task(3).with_order(7),
        ]);
        assert_eq!(store.ordered_ids(), &[2, 3, 1]);
        assert_eq!(store.node(2).unwrap().order_id, 0);
        assert_eq!(store.node(1).unwrap().order_id, 2);
        assert!(store.node(1).unwrap().modified);
    }

    #[test]
    fn test_dense_input_is_not_marked() {
        let store = TaskStore::from_nodes(vec![
            TaskNode::task(1).with_order(0),
            TaskNode::task(2).with_order(1),
        ]);
        assert!(store.modified_ids().is_empty());
    }

    #[test]
    fn test_unknown_node() {
        let store = TaskStore::new();
        assert!(matches!(store.node(5), Err(ScheduleError::UnknownTask(5))));
    }

    #[test]
    fn test_push_appends() {
        let mut store = TaskStore::from_nodes(vec![TaskNode::task(1)]);
        store.push(TaskNode::task(2).with_order(99));
        assert_eq!(store.node(2).unwrap().order_id, 1);
        assert_eq!(store.position(2), Some(1));
        assert_eq!(store.take_modified(), vec![2]);
        assert!(store.modified_ids().is_empty());
    }
}
