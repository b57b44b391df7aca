//! Task graph: node store, order model, hierarchy and dependencies.
//!
//! All relations are id references into one flat [`TaskStore`]. The
//! hierarchy (parent → child) and the dependency graph (predecessor →
//! successor) are two independent relations over the same node set and
//! each must stay acyclic.
//!
//! # Check-then-commit
//!
//! Every mutation is validated against both relations *before* anything
//! is written. A rejected mutation leaves the store untouched and comes
//! back as [`MutationOutcome::NoOp`]; it is a normal outcome of a UI
//! gesture, not an error.
//!
//! Relations on stories apply to their whole subtree; see
//! [`EffectiveGraph`].
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

mod dependency;
mod effective;
mod hierarchy;
mod order;
mod store;

pub use effective::EffectiveGraph;
pub use store::TaskStore;

use tracing::debug;

use crate::models::TaskId;

/// Result of a graph mutation that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store changed.
    Applied,
    /// Nothing happened.
    NoOp(NoOpReason),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }

    /// Logs a rejected gesture and wraps the reason.
    pub(crate) fn rejected(operation: &'static str, task_id: TaskId, reason: NoOpReason) -> Self {
        debug!(operation, task_id, %reason, "mutation ignored");
        MutationOutcome::NoOp(reason)
    }
}

/// Why a mutation was silently rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// Indent found no preceding story on the same level.
    NoEligibleParent,
    /// Outdent on a root node.
    NoParent,
    /// The target parent is not a story.
    NotAStory,
    /// A node cannot be related to itself.
    SelfReference,
    /// The change would make a node its own ancestor.
    CreatesHierarchyCycle,
    /// The change would close a dependency cycle.
    CreatesDependencyCycle,
    /// A dependency would link a node with its own subtree.
    SameSubtree,
    /// The edge or parent link already exists.
    AlreadyPresent,
    /// The edge or parent link does not exist.
    NotPresent,
    /// Order indices are equal or out of range.
    InvalidIndex,
    /// Estimates and assignees belong to tasks only.
    NotATask,
    /// Only milestones carry a fixed start.
    NotAMilestone,
    /// The new value equals the current one.
    Unchanged,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NoOpReason::NoEligibleParent => "no preceding story on the same level",
            NoOpReason::NoParent => "node has no parent",
            NoOpReason::NotAStory => "only stories can be parents",
            NoOpReason::SelfReference => "node cannot reference itself",
            NoOpReason::CreatesHierarchyCycle => "would create a hierarchy cycle",
            NoOpReason::CreatesDependencyCycle => "would create a dependency cycle",
            NoOpReason::SameSubtree => "would link a node with its own subtree",
            NoOpReason::AlreadyPresent => "already present",
            NoOpReason::NotPresent => "not present",
            NoOpReason::InvalidIndex => "index equal or out of range",
            NoOpReason::NotATask => "only tasks carry estimates and assignees",
            NoOpReason::NotAMilestone => "only milestones have a fixed start",
            NoOpReason::Unchanged => "value unchanged",
        };
        f.write_str(text)
    }
}
