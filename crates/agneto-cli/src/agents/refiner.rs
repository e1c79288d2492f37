//! Refiner: turns a human-authored task into an unambiguous one.
//!
//! Session-stateful for the duration of the refinement interview only
//! (§4.5) — the caller owns the `SessionHandle` and drops it once
//! refinement is accepted, rather than keeping it in the task-wide
//! registry the way Bean Counter/Coder/Reviewer are.

use std::path::Path;

use coordination::{
    AllowedTool, LlmProvider, MessageRole, OrchestratorError, OrchestratorResult, ProviderMessage,
    ProviderMode, ProviderRequest, Reporter, SessionHandle,
};

use crate::prompts::refiner_prompt;

pub async fn refine(
    provider: &dyn LlmProvider,
    session: &mut SessionHandle,
    cwd: &Path,
    human_task: &str,
    rejection_feedback: Option<&str>,
    reporter: &Reporter,
) -> OrchestratorResult<String> {
    reporter.phase(coordination::AgentRole::Refiner, "refining task description");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Default,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep, AllowedTool::ListDir],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: refiner_prompt(human_task, rejection_feedback),
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
