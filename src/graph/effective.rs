//! Effective dependency graph over leaf nodes.
//!
//! Relations are declared between any two nodes, but only leaves
//! (tasks and milestones) occupy the calendar. A relation `P → S` is
//! expanded to `p → s` for every leaf `p` under `P` and every leaf `s`
//! under `S`. The expanded graph, hidden relations included, must be a
//! DAG. The Kahn order of its visible edges (ties by order position) is
//! the visiting order of the scheduler and leveler.
//!
//! # Reference
//! Kahn, A.B. (1962), "Topological sorting of large networks", CACM 5(11)

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::{NoOpReason, TaskStore};
use crate::error::{Result, ScheduleError};
use crate::models::{Relation, TaskId};

/// A pending change checked before it is committed.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Overlay {
    /// Node moved under a new parent (`None` = root).
    pub reparent: Option<(TaskId, Option<TaskId>)>,
    /// Relation about to be added.
    pub extra: Option<Relation>,
}

impl Overlay {
    pub fn reparent(node: TaskId, parent: Option<TaskId>) -> Self {
        Self {
            reparent: Some((node, parent)),
            extra: None,
        }
    }

    pub fn relation(relation: Relation) -> Self {
        Self {
            reparent: None,
            extra: Some(relation),
        }
    }
}

/// The store as it would look with an overlay applied.
pub(crate) struct GraphView<'a> {
    store: &'a TaskStore,
    overlay: Overlay,
    children: HashMap<TaskId, Vec<TaskId>>,
}

impl<'a> GraphView<'a> {
    pub fn new(store: &'a TaskStore, overlay: Overlay) -> Self {
        let mut view = Self {
            store,
            overlay,
            children: HashMap::new(),
        };
        let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for &id in store.ordered_ids() {
            if let Some(parent) = view.parent_of(id) {
                children.entry(parent).or_default().push(id);
            }
        }
        view.children = children;
        view
    }

    pub fn parent_of(&self, id: TaskId) -> Option<TaskId> {
        match self.overlay.reparent {
            Some((node, parent)) if node == id => parent,
            _ => self.store.get(id).and_then(|n| n.parent_id),
        }
    }

    pub fn children_of(&self, id: TaskId) -> &[TaskId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `a` is a proper ancestor of `b`.
    pub fn is_ancestor_of(&self, a: TaskId, b: TaskId) -> bool {
        let mut current = self.parent_of(b);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == a {
                return true;
            }
            steps += 1;
            if steps > self.store.len() {
                return false;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// Non-story nodes in the subtree of `id` (including `id` itself), in
    /// pre-order.
    pub fn leaves_of(&self, id: TaskId) -> Vec<TaskId> {
        let mut leaves = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            match self.store.get(current) {
                Some(node) if node.is_story() => {
                    stack.extend(self.children_of(current).iter().rev());
                }
                Some(_) => leaves.push(current),
                None => {}
            }
        }
        leaves
    }

    fn relations(&self) -> impl Iterator<Item = Relation> + '_ {
        self.store
            .iter()
            .flat_map(|n| {
                n.predecessors
                    .iter()
                    .map(move |r| Relation::new(r.predecessor_id, n.id, r.visible))
            })
            .chain(self.overlay.extra)
    }
}

enum Analysis {
    Acyclic(EffectiveGraph),
    Rejected(NoOpReason),
}

/// Expanded leaf dependency graph in topological order.
#[derive(Debug, Clone, Default)]
pub struct EffectiveGraph {
    order: Vec<TaskId>,
    visible: HashMap<TaskId, Vec<TaskId>>,
}

impl EffectiveGraph {
    /// Builds the graph for the committed store.
    ///
    /// # Errors
    /// `Integrity` if a relation references a missing node, links a node
    /// with its own subtree, or the expanded graph has a cycle.
    pub fn build(store: &TaskStore) -> Result<Self> {
        match analyze(&GraphView::new(store, Overlay::default()))? {
            Analysis::Acyclic(graph) => Ok(graph),
            Analysis::Rejected(reason) => Err(ScheduleError::Integrity(format!(
                "dependency graph is inconsistent: {reason}"
            ))),
        }
    }

    /// Leaves, visible predecessors first. Ties follow the order model.
    pub fn order(&self) -> &[TaskId] {
        &self.order
    }

    /// Leaves whose end bounds the start of `id`, in order position.
    pub fn visible_predecessors(&self, id: TaskId) -> &[TaskId] {
        self.visible.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Validates the store with `overlay` applied. `Ok(None)` means the
/// change may be committed.
pub(crate) fn check_overlay(store: &TaskStore, overlay: Overlay) -> Result<Option<NoOpReason>> {
    match analyze(&GraphView::new(store, overlay))? {
        Analysis::Acyclic(_) => Ok(None),
        Analysis::Rejected(reason) => Ok(Some(reason)),
    }
}

fn analyze(view: &GraphView<'_>) -> Result<Analysis> {
    let store = view.store;
    let position: HashMap<TaskId, usize> = store
        .ordered_ids()
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();
    let leaves: Vec<TaskId> = store.iter().filter(|n| !n.is_story()).map(|n| n.id).collect();

    let mut successors: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();
    let mut visible_successors: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();
    let mut visible: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();
    let mut leaf_cache: HashMap<TaskId, Vec<TaskId>> = HashMap::new();

    for relation in view.relations() {
        let (pred, succ) = (relation.predecessor_id, relation.successor_id);
        if !store.contains(pred) {
            return Err(ScheduleError::Integrity(format!(
                "task {succ} references unknown predecessor {pred}"
            )));
        }
        if pred == succ {
            return Ok(Analysis::Rejected(NoOpReason::SelfReference));
        }
        if view.is_ancestor_of(pred, succ) || view.is_ancestor_of(succ, pred) {
            return Ok(Analysis::Rejected(NoOpReason::SameSubtree));
        }

        let pred_leaves = leaf_cache
            .entry(pred)
            .or_insert_with(|| view.leaves_of(pred))
            .clone();
        let succ_leaves = leaf_cache
            .entry(succ)
            .or_insert_with(|| view.leaves_of(succ))
            .clone();
        for &s in &succ_leaves {
            for &p in &pred_leaves {
                successors.entry(p).or_default().insert(s);
                if relation.visible {
                    visible_successors.entry(p).or_default().insert(s);
                    visible.entry(s).or_default().insert(p);
                }
            }
        }
    }

    let rank = |id: TaskId| position.get(&id).copied().unwrap_or(usize::MAX);
    if kahn_order(&leaves, &successors, rank).len() < leaves.len() {
        return Ok(Analysis::Rejected(NoOpReason::CreatesDependencyCycle));
    }
    // A subgraph of a DAG is acyclic, so this visits every leaf.
    let order = kahn_order(&leaves, &visible_successors, rank);

    let visible = visible
        .into_iter()
        .map(|(id, preds)| {
            let mut preds: Vec<TaskId> = preds.into_iter().collect();
            preds.sort_by_key(|&p| rank(p));
            (id, preds)
        })
        .collect();

    Ok(Analysis::Acyclic(EffectiveGraph { order, visible }))
}

/// Kahn order over `leaves`, smallest rank first among ready nodes. Shorter
/// than `leaves` when the edges contain a cycle.
fn kahn_order(
    leaves: &[TaskId],
    successors: &HashMap<TaskId, HashSet<TaskId>>,
    rank: impl Fn(TaskId) -> usize,
) -> Vec<TaskId> {
    let mut in_degree: HashMap<TaskId, usize> = leaves.iter().map(|&id| (id, 0)).collect();
    for targets in successors.values() {
        for s in targets {
            if let Some(d) = in_degree.get_mut(s) {
                *d += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<(usize, TaskId)>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(&id, _)| Reverse((rank(id), id)))
        .collect();

    let mut order = Vec::with_capacity(leaves.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id);
        if let Some(targets) = successors.get(&id) {
            for &s in targets {
                if let Some(d) = in_degree.get_mut(&s) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse((rank(s), s)));
                    }
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskNode;

    fn store(nodes: Vec<TaskNode>) -> TaskStore {
        TaskStore::from_nodes(
            nodes
                .into_iter()
                .enumerate()
                .map(|(i, n)| n.with_order(i))
                .collect(),
        )
    }

    #[test]
    fn test_chain_order() {
        let s = store(vec![
            TaskNode::task(1).with_predecessor(2),
            TaskNode::task(2),
            TaskNode::task(3),
        ]);
        let g = EffectiveGraph::build(&s).unwrap();
        assert_eq!(g.order(), &[2, 1, 3]);
        assert_eq!(g.visible_predecessors(1), &[2]);
        assert!(g.visible_predecessors(2).is_empty());
    }

    #[test]
    fn test_story_relation_expands_to_leaves() {
        // S1{A, B} → S2{C, D}
        let s = store(vec![
            TaskNode::story(10),
            TaskNode::task(1).with_parent(10),
            TaskNode::task(2).with_parent(10),
            TaskNode::story(20).with_predecessor(10),
            TaskNode::task(3).with_parent(20),
            TaskNode::task(4).with_parent(20),
        ]);
        let g = EffectiveGraph::build(&s).unwrap();
        assert_eq!(g.order(), &[1, 2, 3, 4]);
        assert_eq!(g.visible_predecessors(3), &[1, 2]);
        assert_eq!(g.visible_predecessors(4), &[1, 2]);
    }

    #[test]
    fn test_hidden_relation_leaves_order_alone() {
        let s = store(vec![
            TaskNode::task(1).with_hidden_predecessor(3),
            TaskNode::task(2),
            TaskNode::task(3),
        ]);
        let g = EffectiveGraph::build(&s).unwrap();
        assert_eq!(g.order(), &[1, 2, 3]);
        assert!(g.visible_predecessors(1).is_empty());
    }

    #[test]
    fn test_hidden_relation_still_counts_for_cycles() {
        let s = store(vec![TaskNode::task(1).with_hidden_predecessor(2), TaskNode::task(2)]);
        assert_eq!(
            check_overlay(&s, Overlay::relation(Relation::new(1, 2, true))).unwrap(),
            Some(NoOpReason::CreatesDependencyCycle)
        );
        assert_eq!(
            check_overlay(&s, Overlay::relation(Relation::new(1, 2, false))).unwrap(),
            Some(NoOpReason::CreatesDependencyCycle)
        );
    }

    #[test]
    fn test_cycle_through_story_is_detected() {
        // A → S, and S contains B with B → A
        let s = store(vec![
            TaskNode::task(1).with_predecessor(2),
            TaskNode::story(10).with_predecessor(1),
            TaskNode::task(2).with_parent(10),
        ]);
        assert!(matches!(
            EffectiveGraph::build(&s),
            Err(ScheduleError::Integrity(_))
        ));
    }

    #[test]
    fn test_unknown_predecessor_is_integrity_error() {
        let s = store(vec![TaskNode::task(1).with_predecessor(99)]);
        let err = EffectiveGraph::build(&s).unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_overlay_reparent_detects_cycle() {
        // Y → S and Z → Y; moving Z under S makes Z its own predecessor.
        let s = store(vec![
            TaskNode::story(10).with_predecessor(2),
            TaskNode::task(1).with_parent(10),
            TaskNode::task(2).with_predecessor(3),
            TaskNode::task(3),
        ]);
        assert_eq!(check_overlay(&s, Overlay::default()).unwrap(), None);
        assert_eq!(
            check_overlay(&s, Overlay::reparent(3, Some(10))).unwrap(),
            Some(NoOpReason::CreatesDependencyCycle)
        );
    }

    #[test]
    fn test_overlay_reparent_into_linked_story() {
        let s2 = store(vec![
            TaskNode::story(10),
            TaskNode::task(1).with_predecessor(10),
            TaskNode::task(2).with_parent(10),
        ]);
        assert_eq!(
            check_overlay(&s2, Overlay::reparent(1, Some(10))).unwrap(),
            Some(NoOpReason::SameSubtree)
        );
    }

    #[test]
    fn test_overlay_relation() {
        let s = store(vec![TaskNode::task(1).with_predecessor(2), TaskNode::task(2)]);
        assert_eq!(
            check_overlay(&s, Overlay::relation(Relation::new(1, 2, true))).unwrap(),
            Some(NoOpReason::CreatesDependencyCycle)
        );
        assert_eq!(
            check_overlay(&s, Overlay::relation(Relation::new(2, 2, true))).unwrap(),
            Some(NoOpReason::SelfReference)
        );
    }
}
