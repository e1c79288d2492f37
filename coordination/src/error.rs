use thiserror::Error;

use crate::exec_fsm::ExecState;
use crate::task_fsm::TaskState;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Top-level error type for the orchestration engine.
///
/// Library code returns this; the binary crate wraps it in `anyhow` at the
/// process boundary.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("illegal transition: {state} does not accept {event}")]
    IllegalTaskTransition { state: TaskState, event: String },

    #[error("illegal execution transition: {state} does not accept {event}")]
    IllegalExecTransition { state: ExecState, event: String },

    #[error("checkpoint schema version {found} is not supported (expected {expected})")]
    IncompatibleCheckpointSchema { found: u8, expected: u8 },

    #[error("checkpoint task id {found} does not match running task {expected}")]
    CheckpointTaskMismatch { found: String, expected: String },

    #[error("baseline commit {0} no longer exists in the repository")]
    BaselineCommitMissing(String),

    #[error("cherry-pick of commit {commit} failed during restoration: {reason}")]
    CherryPickConflict { commit: String, reason: String },

    #[error("llm provider call failed: {0}")]
    ProviderFailure(String),

    #[error("git operation failed: {0}")]
    GitFailure(String),

    #[error("verdict parsing exhausted retries ({attempts} malformed replies)")]
    ParseExhausted { attempts: u32 },

    #[error("attempt budget exhausted for phase {phase} (max {max})")]
    AttemptBudgetExhausted { phase: String, max: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Whether this error is the kind §7 calls "fatal" — an unrecoverable
    /// invariant violation that must abandon the task outright rather than
    /// retry within a phase.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestratorError::IncompatibleCheckpointSchema { .. }
                | OrchestratorError::CheckpointTaskMismatch { .. }
                | OrchestratorError::BaselineCommitMissing(_)
        )
    }
}
