//! Coordination engine for the agneto orchestrator.
//!
//! This crate provides the generic, provider-agnostic pieces of a
//! hierarchical plan/code/review task pipeline:
//!
//! - [`task_fsm`] / [`exec_fsm`]: the outer task lifecycle and inner
//!   execution-cycle state machines.
//! - [`command_bus`]: the request/response channel human approvals and
//!   injected commands travel over.
//! - [`verdicts`]: typed, fail-closed parsing of specialist replies.
//! - [`session`]: per-role session identity bookkeeping.
//! - [`checkpoint`]: durable task-state snapshots and restoration.
//! - [`events`]: the best-effort lifecycle event bus.
//! - [`provider`] / [`git_bridge`]: the narrow traits the orchestrator
//!   binary supplies concrete implementations for.
//! - [`reporter`] / [`telemetry`] / [`audit`] / [`config`] / [`error`]:
//!   ambient logging, cost accounting, dashboard forwarding,
//!   configuration and error plumbing.

#![allow(dead_code)]
#![allow(clippy::uninlined_format_args)]

pub mod audit;
pub mod checkpoint;
pub mod command_bus;
pub mod config;
pub mod error;
pub mod events;
pub mod exec_fsm;
pub mod git_bridge;
pub mod provider;
pub mod reporter;
pub mod session;
pub mod task_fsm;
pub mod telemetry;
pub mod verdicts;

pub use checkpoint::{
    is_checkpointable, load_checkpoint, load_latest_checkpoint, restore_from_checkpoint, save_checkpoint,
    GitSnapshot, ResumeResult, TaskCheckpoint, TaskContextSnapshot, CHECKPOINT_SCHEMA_VERSION,
};
pub use command_bus::{Command, CommandBus, CommandType};
pub use config::{LogLevel, OrchestratorOptions};
pub use error::{OrchestratorError, OrchestratorResult};
pub use events::{DomainEvent, EventBus, EventBusError};
pub use exec_fsm::{
    legal_exec_transition, Chunk, ExecEvent, ExecState, ExecTransitionRecord, ExecutionContext,
    ExecutionStateMachine, PlanProposal,
};
pub use git_bridge::{GitBridge, GitBridgeError, ShellGitBridge};
pub use provider::{
    AgentEvent, AllowedTool, LlmProvider, MessageRole, ProviderError, ProviderMessage, ProviderMode,
    ProviderRequest, ProviderResponse,
};
pub use reporter::{Reporter, DEFAULT_FLUSH_INTERVAL};
pub use session::{AgentRole, SessionHandle, SessionRegistry};
pub use task_fsm::{legal_transition, TaskEvent, TaskState, TaskStateMachine, TransitionRecord};
pub use telemetry::{AgentUsage, MetricsCollector};
pub use verdicts::{
    extract_json_block, parse_bean_counter_output, parse_code_verdict, parse_curmudgeon_verdict,
    parse_plan_verdict, BeanCounterOutput, CodeVerdict, CurmudgeonVerdict, GardenerResult, PlanVerdict,
    SuperReviewerOutcome, SuperReviewerVerdict,
};
pub use audit::{Dashboard, DashboardForwarder, NullForwarder};
