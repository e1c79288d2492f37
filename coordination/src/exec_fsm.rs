//! Inner execution state machine: the chunk/plan/code/review cycle.
//!
//! Same shape as `task_fsm`, scaled down to one execution phase's
//! lifetime. Attempt counters live on `ExecutionContext` rather than the
//! FSM itself, matching §3's data model split.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    TaskStart,
    BeanCounting,
    Planning,
    PlanReview,
    Implementing,
    CodeReview,
    TaskComplete,
    TaskFailed,
    TaskAborted,
}

impl ExecState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecState::TaskComplete | ExecState::TaskFailed | ExecState::TaskAborted
        )
    }
}

impl fmt::Display for ExecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecState::TaskStart => "TASK_START",
            ExecState::BeanCounting => "BEAN_COUNTING",
            ExecState::Planning => "PLANNING",
            ExecState::PlanReview => "PLAN_REVIEW",
            ExecState::Implementing => "IMPLEMENTING",
            ExecState::CodeReview => "CODE_REVIEW",
            ExecState::TaskComplete => "TASK_COMPLETE",
            ExecState::TaskFailed => "TASK_FAILED",
            ExecState::TaskAborted => "TASK_ABORTED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecEvent {
    StartChunking,
    WorkChunkEmitted,
    BeanCounterTaskComplete,
    PlanProposed,
    ApprovePlan,
    RevisePlan,
    RevisePlanAttemptsExhausted,
    RejectPlan,
    CodeApplied,
    ApproveCode,
    StepComplete,
    TaskCompleteVerdict,
    ReviseCode,
    ReviseCodeAttemptsExhausted,
    RejectCode,
    HumanAbort,
    ErrorOccurred,
}

impl fmt::Display for ExecEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub fn legal_exec_transition(from: ExecState, event: &ExecEvent) -> Option<ExecState> {
    use ExecEvent::*;
    use ExecState::*;

    if matches!(event, HumanAbort) && !from.is_terminal() {
        return Some(TaskAborted);
    }

    match (from, event) {
        (TaskStart, StartChunking) => Some(BeanCounting),
        (BeanCounting, WorkChunkEmitted) => Some(Planning),
        (BeanCounting, BeanCounterTaskComplete) => Some(TaskComplete),
        (Planning, PlanProposed) => Some(PlanReview),
        (PlanReview, ApprovePlan) => Some(Implementing),
        (PlanReview, RevisePlan) => Some(Planning),
        (PlanReview, RevisePlanAttemptsExhausted) => Some(TaskFailed),
        (PlanReview, RejectPlan) => Some(Planning),
        (Implementing, CodeApplied) => Some(CodeReview),
        (CodeReview, ApproveCode) => Some(BeanCounting),
        (CodeReview, StepComplete) => Some(BeanCounting),
        (CodeReview, TaskCompleteVerdict) => Some(TaskComplete),
        (CodeReview, ReviseCode) => Some(Implementing),
        (CodeReview, ReviseCodeAttemptsExhausted) => Some(TaskFailed),
        (CodeReview, RejectCode) => Some(BeanCounting),
        (s, ErrorOccurred) if !s.is_terminal() => Some(TaskFailed),
        _ => None,
    }
}

/// The work unit Bean Counter hands to the Coder.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Chunk {
    pub description: String,
    pub requirements: Vec<String>,
    pub context: String,
}

/// The Coder's plan proposal for the current chunk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlanProposal {
    pub description: String,
    pub steps: Vec<String>,
    pub affected_files: Vec<String>,
}

/// Per-phase state for one execution cycle. Lifetime = one EXECUTING
/// phase of the outer FSM (§3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionContext {
    pub current_chunk: Option<Chunk>,
    pub current_plan: Option<PlanProposal>,
    pub plan_feedback: Option<String>,
    pub code_feedback: Option<String>,
    pub plan_attempts: u32,
    pub code_attempts: u32,
    pub last_error: Option<String>,
}

impl ExecutionContext {
    /// Clears per-chunk state on entry to a new BEAN_COUNTING cycle.
    /// Testable property 3: `plan_attempts`/`code_attempts` are zero on
    /// entry to the next BEAN_COUNTING.
    pub fn reset_for_next_chunk(&mut self) {
        self.current_chunk = None;
        self.current_plan = None;
        self.plan_feedback = None;
        self.code_feedback = None;
        self.plan_attempts = 0;
        self.code_attempts = 0;
    }

    pub fn reset_code_attempts(&mut self) {
        self.code_attempts = 0;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecTransitionRecord {
    pub from: ExecState,
    pub to: ExecState,
    pub event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStateMachine {
    current: ExecState,
    transitions: Vec<ExecTransitionRecord>,
}

impl ExecutionStateMachine {
    pub fn new() -> Self {
        Self {
            current: ExecState::TaskStart,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> ExecState {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[ExecTransitionRecord] {
        &self.transitions
    }

    pub fn advance(&mut self, event: ExecEvent) -> OrchestratorResult<ExecState> {
        if self.current.is_terminal() {
            return Err(OrchestratorError::IllegalExecTransition {
                state: self.current,
                event: event.to_string(),
            });
        }
        match legal_exec_transition(self.current, &event) {
            Some(to) => {
                self.transitions.push(ExecTransitionRecord {
                    from: self.current,
                    to,
                    event: event.to_string(),
                });
                self.current = to;
                Ok(to)
            }
            None => Err(OrchestratorError::IllegalExecTransition {
                state: self.current,
                event: event.to_string(),
            }),
        }
    }

    pub fn restore(current: ExecState, transitions: Vec<ExecTransitionRecord>) -> Self {
        Self { current, transitions }
    }
}

impl Default for ExecutionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
