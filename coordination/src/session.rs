//! Per-role session identity bookkeeping.
//!
//! §3 and §4.5 of the spec agree that Bean Counter, Coder, and Reviewer
//! are session-stateful across an entire task, and that Curmudgeon and
//! Gardener are stateless per call. They disagree on SuperReviewer (§3
//! lists it as stateful, §4.5 calls it "stateless per call"); this
//! expansion follows §4.5, the more detailed section, and treats
//! SuperReviewer as stateless — see DESIGN.md. Refiner gets a session
//! for the duration of the refinement interview only (§4.5), not the
//! whole task, so its handle is created and dropped by the Refiner
//! phase rather than living in the task-wide registry.
//!
//! Modeled on the bookkeeping style of the teacher's `harness/session.rs`
//! `SessionManager`, scaled down to what the distilled spec actually
//! needs: a stable id plus an initialization flag per role.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Refiner,
    Planner,
    Curmudgeon,
    BeanCounter,
    Coder,
    Reviewer,
    SuperReviewer,
    Gardener,
}

impl AgentRole {
    /// Whether this role holds a persistent session across calls within
    /// its scope (the whole task for BeanCounter/Coder/Reviewer, the
    /// refinement interview for Refiner).
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            AgentRole::Refiner | AgentRole::BeanCounter | AgentRole::Coder | AgentRole::Reviewer
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub is_initialized: bool,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            is_initialized: false,
        }
    }

    /// Marks the session as having sent its system prompt at least once.
    /// Invariant (§3): once `is_initialized` is true for a session id,
    /// the system prompt must never be resent.
    pub fn mark_initialized(&mut self) {
        self.is_initialized = true;
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one `SessionHandle` per stateful role for the current task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRegistry {
    handles: std::collections::HashMap<AgentRole, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing handle for `role`, creating one on first
    /// use. Stateless roles (Curmudgeon, SuperReviewer, Gardener) should
    /// not be passed here — callers invoke them with `sessionId = None`.
    pub fn handle_for(&mut self, role: AgentRole) -> &mut SessionHandle {
        debug_assert!(role.is_stateful(), "only stateful roles hold a session handle");
        self.handles.entry(role).or_insert_with(SessionHandle::new)
    }

    pub fn get(&self, role: AgentRole) -> Option<&SessionHandle> {
        self.handles.get(&role)
    }

    pub fn snapshot(&self) -> Vec<(AgentRole, SessionHandle)> {
        self.handles.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    pub fn restore(entries: Vec<(AgentRole, SessionHandle)>) -> Self {
        Self {
            handles: entries.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_creates_uninitialized_handle() {
        let mut registry = SessionRegistry::new();
        let handle = registry.handle_for(AgentRole::Coder);
        assert!(!handle.is_initialized);
        let id = handle.session_id.clone();
        handle.mark_initialized();

        let handle_again = registry.handle_for(AgentRole::Coder);
        assert!(handle_again.is_initialized);
        assert_eq!(handle_again.session_id, id);
    }

    #[test]
    fn distinct_roles_get_distinct_sessions() {
        let mut registry = SessionRegistry::new();
        let coder_id = registry.handle_for(AgentRole::Coder).session_id.clone();
        let reviewer_id = registry.handle_for(AgentRole::Reviewer).session_id.clone();
        assert_ne!(coder_id, reviewer_id);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut registry = SessionRegistry::new();
        registry.handle_for(AgentRole::BeanCounter).mark_initialized();
        let snapshot = registry.snapshot();
        let restored = SessionRegistry::restore(snapshot);
        assert!(restored.get(AgentRole::BeanCounter).unwrap().is_initialized);
    }
}
