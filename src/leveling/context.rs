//! Leveling context passed explicitly by the caller.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::models::UserId;

/// Caller-owned state for one leveling pass.
///
/// Carries the session identity used in log spans, an optional resource
/// filter, and a cancellation token. A cancelled pass discards its
/// partial state and commits nothing.
#[derive(Debug, Clone, Default)]
pub struct LevelingContext {
    /// Interactive session the pass runs for.
    pub session: Option<String>,
    /// Resources to level. Empty = all.
    pub resources: HashSet<UserId>,
    /// Checked before each task is visited.
    pub cancellation: Option<CancellationToken>,
}

impl LevelingContext {
    /// Creates a context that levels every resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session identity.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Restricts leveling to one more resource.
    pub fn with_resource(mut self, user_id: UserId) -> Self {
        self.resources.insert(user_id);
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Whether the caller asked the pass to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Whether tasks of `user_id` are serialized by this pass.
    pub fn levels(&self, user_id: UserId) -> bool {
        self.resources.is_empty() || self.resources.contains(&user_id)
    }
}
