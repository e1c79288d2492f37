//! Bean Counter: stateful for the whole task, chunks the plan one step
//! at a time via `[CHUNK_COMPLETED]`/`[NEXT_CHUNKING]` deltas rather than
//! resending the full plan each call.

use std::path::Path;

use coordination::{
    parse_bean_counter_output, AllowedTool, BeanCounterOutput, LlmProvider, MessageRole,
    OrchestratorError, OrchestratorResult, ProviderMessage, ProviderMode, ProviderRequest, Reporter,
    SessionHandle,
};

use crate::prompts::bean_counter_prompt;

pub async fn next_chunk(
    provider: &dyn LlmProvider,
    session: &mut SessionHandle,
    cwd: &Path,
    plan_markdown: &str,
    completed_summary: Option<&str>,
    reporter: &Reporter,
) -> OrchestratorResult<(BeanCounterOutput, String)> {
    reporter.phase(coordination::AgentRole::BeanCounter, "chunking plan");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Default,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: bean_counter_prompt(plan_markdown, completed_summary),
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

    Ok((parse_bean_counter_output(&response.raw), response.raw))
}
