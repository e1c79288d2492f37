//! Outer task-lifecycle state machine.
//!
//! Directly modeled on the teacher's `state_machine.rs` `OrchestratorState`/
//! `StateMachine`: a plain enum with `is_terminal`/`Display`, a free
//! `is_legal_transition` function encoding the transition graph, and a
//! `TaskStateMachine` wrapper that records transition history and rejects
//! illegal advances instead of silently no-op'ing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Init,
    Refining,
    Planning,
    Curmudgeoning,
    Executing,
    SuperReviewing,
    Gardening,
    Complete,
    Abandoned,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Abandoned)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Init => "INIT",
            TaskState::Refining => "REFINING",
            TaskState::Planning => "PLANNING",
            TaskState::Curmudgeoning => "CURMUDGEONING",
            TaskState::Executing => "EXECUTING",
            TaskState::SuperReviewing => "SUPER_REVIEWING",
            TaskState::Gardening => "GARDENING",
            TaskState::Complete => "COMPLETE",
            TaskState::Abandoned => "ABANDONED",
        };
        write!(f, "{s}")
    }
}

/// Events driving the outer FSM. Named after §4.2's transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    StartTask { interactive: bool },
    RefinementComplete,
    RefinementCancelled,
    PlanCreated,
    PlanFailed,
    CurmudgeonApproved,
    CurmudgeonSimplify,
    ExecutionComplete,
    ExecutionFailed,
    SuperReviewPassed,
    HumanApproved,
    SuperReviewNeedsHuman,
    HumanRetry,
    HumanAbandon,
    GardeningComplete,
    ErrorOccurred,
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The transition graph from §4.2's table. Returns the destination state
/// if `event` is legal from `from`, else `None`.
pub fn legal_transition(from: TaskState, event: &TaskEvent) -> Option<TaskState> {
    use TaskEvent::*;
    use TaskState::*;

    match (from, event) {
        (Init, StartTask { interactive: true }) => Some(Refining),
        (Init, StartTask { interactive: false }) => Some(Planning),
        (Refining, RefinementComplete) => Some(Planning),
        (Refining, RefinementCancelled) => Some(Planning),
        (Planning, PlanCreated) => Some(Curmudgeoning),
        (Planning, PlanFailed) => Some(Abandoned),
        (Curmudgeoning, CurmudgeonApproved) => Some(Executing),
        (Curmudgeoning, CurmudgeonSimplify) => Some(Planning),
        (Executing, ExecutionComplete) => Some(SuperReviewing),
        (Executing, ExecutionFailed) => Some(Abandoned),
        (SuperReviewing, SuperReviewPassed) => Some(Gardening),
        (SuperReviewing, HumanApproved) => Some(Gardening),
        (SuperReviewing, SuperReviewNeedsHuman) => Some(SuperReviewing),
        (SuperReviewing, HumanRetry) => Some(Planning),
        (SuperReviewing, HumanAbandon) => Some(Abandoned),
        (Gardening, GardeningComplete) => Some(Complete),
        // ERROR_OCCURRED is handled specially by the orchestrator per
        // state (§4.4/§7); the FSM itself only records the generic
        // ABANDONED path for states with no more specific recovery.
        (s, ErrorOccurred) if !s.is_terminal() => Some(Abandoned),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: TaskState,
    pub to: TaskState,
    pub event: String,
    pub reason: String,
}

/// The outer FSM. Holds only the state machinery; `TaskContext` (plan
/// text, session ids, etc.) is owned separately by the orchestrator and
/// threaded through explicitly rather than embedded here, to keep the
/// FSM itself a pure transition engine matching the teacher's
/// `StateMachine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStateMachine {
    current: TaskState,
    transitions: Vec<TransitionRecord>,
}

impl TaskStateMachine {
    pub fn new() -> Self {
        Self {
            current: TaskState::Init,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> TaskState {
        self.current
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Advance the FSM on `event`, recording the transition. Per
    /// testable property 1: if the transition is illegal, `current` is
    /// left unchanged and an error is returned instead of a silent
    /// no-op.
    pub fn advance(&mut self, event: TaskEvent, reason: impl Into<String>) -> OrchestratorResult<TaskState> {
        if self.current.is_terminal() {
            return Err(OrchestratorError::IllegalTaskTransition {
                state: self.current,
                event: event.to_string(),
            });
        }

        match legal_transition(self.current, &event) {
            Some(to) => {
                self.transitions.push(TransitionRecord {
                    from: self.current,
                    to,
                    event: event.to_string(),
                    reason: reason.into(),
                });
                self.current = to;
                Ok(to)
            }
            None => Err(OrchestratorError::IllegalTaskTransition {
                state: self.current,
                event: event.to_string(),
            }),
        }
    }

    /// Reconstruct a FSM at a given state with transition history, used
    /// by checkpoint restoration (§4.8) to rehydrate by state name
    /// rather than replaying every event.
    pub fn restore(current: TaskState, transitions: Vec<TransitionRecord>) -> Self {
        Self { current, transitions }
    }
}

impl Default for TaskStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
