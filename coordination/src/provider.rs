//! LLM provider abstraction.
//!
//! The provider itself is explicitly out of scope (§1) — this crate
//! defines only the narrow contract the orchestrator needs, as an async
//! trait, so that tests and alternate backends can supply their own
//! implementation. Modeled on the teacher's `IssueTracker` trait in
//! `beads_bridge.rs`: an abstract interface plus one concrete shelling/
//! HTTP-style implementation, kept separate so tests can substitute a
//! scripted mock instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    Default,
    Plan,
    Propose,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllowedTool {
    ReadFile,
    Grep,
    Bash,
    Edit,
    Write,
    ListDir,
    MultiEdit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Streaming progress forwarded into the Task FSM as `liveActivity`/
/// `toolStatus` per §4.5. Modeled as a channel rather than stored
/// closures — idiomatic for an async runtime where a `Sender` composes
/// with `tokio::select!`/`tokio::spawn` more simply than captured
/// callbacks would.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Progress { delta: String },
    ToolUse { tool: String, input: String },
    ToolResult { is_error: bool },
    Complete { cost: f64, duration_ms: u64, tokens: u64 },
}

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub cwd: std::path::PathBuf,
    pub mode: ProviderMode,
    pub allowed_tools: Vec<AllowedTool>,
    pub model: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub session_id: Option<String>,
    pub is_initialized: bool,
    pub events: Option<UnboundedSender<AgentEvent>>,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub raw: String,
    pub cost: f64,
    pub duration_ms: u64,
    pub tokens: u64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    CallFailed(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn query(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
