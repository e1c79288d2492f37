//! Coder: stateful for the whole task, proposes a plan for each chunk
//! and then applies it. Plan proposal and code application share one
//! session (§4.5) so the apply call inherits the proposal's context.

use std::path::Path;

use coordination::{
    extract_json_block, AllowedTool, Chunk, LlmProvider, MessageRole, OrchestratorError,
    OrchestratorResult, PlanProposal, ProviderMessage, ProviderMode, ProviderRequest, Reporter,
    SessionHandle,
};

use crate::prompts::{coder_apply_prompt, coder_plan_prompt};

/// Returns `None` when the reply doesn't contain a well-formed
/// `PlanProposal` object — the caller re-asks via `super::call_with_retry`.
pub fn parse_plan_proposal(raw: &str) -> Option<PlanProposal> {
    let block = extract_json_block(raw)?;
    serde_json::from_str(block).ok()
}

pub async fn propose_plan_for_chunk(
    provider: &dyn LlmProvider,
    session: &mut SessionHandle,
    cwd: &Path,
    chunk: &Chunk,
    plan_feedback: Option<&str>,
    reporter: &Reporter,
) -> OrchestratorResult<(PlanProposal, String)> {
    reporter.phase(coordination::AgentRole::Coder, "proposing implementation plan");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Propose,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep, AllowedTool::ListDir],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: coder_plan_prompt(chunk, plan_feedback),
        }],
        session_id: Some(session.session_id.clone()),
        is_initialized: session.is_initialized,
        events: None,
    };

    let (proposal, raw) = super::call_with_retry(provider, request, parse_plan_proposal, 2).await?;
    session.mark_initialized();

    Ok((proposal, raw))
}

/// Applies an approved plan via the provider's own tool use and returns
/// the Coder's free-text summary of what changed. The actual diff is
/// read back from the working tree by the orchestrator via `GitBridge`,
/// not parsed out of this reply.
pub async fn apply_code(
    provider: &dyn LlmProvider,
    session: &mut SessionHandle,
    cwd: &Path,
    plan: &PlanProposal,
    code_feedback: Option<&str>,
    reporter: &Reporter,
) -> OrchestratorResult<String> {
    reporter.phase(coordination::AgentRole::Coder, "applying plan");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Default,
        allowed_tools: vec![
            AllowedTool::ReadFile,
            AllowedTool::Grep,
            AllowedTool::ListDir,
            AllowedTool::Edit,
            AllowedTool::Write,
            AllowedTool::MultiEdit,
            AllowedTool::Bash,
        ],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: coder_apply_prompt(plan, code_feedback),
        }],
        session_id: Some(session.session_id.clone()),
        is_initialized: session.is_initialized,
        events: None,
    };

    let response = provider
        .query(request)
        .await
        .map_err(|e| OrchestratorError::ProviderFailure(e.to_string()))?;
    session.mark_initialized();

    Ok(response.raw)
}
