//! Lifecycle event bus.
//!
//! Replaces the duck-typed, string-keyed event emitter the orchestrator
//! used to rely on (see SPEC_FULL.md §9) with a tagged `DomainEvent` enum
//! broadcast over a `tokio::sync::broadcast` channel. Structurally this is
//! the same shape as `EventBus` in the teacher's `events/bus.rs`: a thin
//! wrapper giving `publish`/`subscribe` plus a filtered receiver, just with
//! a fixed enum payload instead of a generic one.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::exec_fsm::ExecState;
use crate::task_fsm::TaskState;
use crate::verdicts::{CodeVerdict, CurmudgeonVerdict, GardenerResult, PlanVerdict, SuperReviewerVerdict};

/// Tagged lifecycle events emitted by the task and execution state machines.
///
/// Named directly after the distilled spec's §4.2 event list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    StateChanged { from: TaskState, to: TaskState, reason: String },
    PhaseChanged { exec_state: ExecState },
    PlanReady { plan_markdown: String },
    RefinementReady { refined_task: String },
    CurmudgeonFeedback { verdict: CurmudgeonVerdict },
    SuperReviewComplete { verdict: SuperReviewerVerdict },
    GardenerComplete { result: GardenerResult },
    QuestionAsked { question: String },
    ToolStatus { tool: String, detail: String },
    ActivityUpdated { summary: String },
    PlanAwaitingApproval,
    RefinementAwaitingApproval,
    SuperReviewAwaitingApproval,
    InjectionPauseRequested,
    PlanVerdictIssued { verdict: PlanVerdict },
    CodeVerdictIssued { verdict: CodeVerdict },
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("failed to broadcast event: {0}")]
    SendFailed(String),
}

/// Fan-out, best-effort publisher for `DomainEvent`s.
///
/// "No subscribers" is not an error — events are best-effort by design
/// (§4.2: "Subscribers are fan-out, best-effort").
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) -> Result<(), EventBusError> {
        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => {
                // No active receivers right now; not an error per §4.2.
                Ok(())
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
