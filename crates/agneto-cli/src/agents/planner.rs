//! Planner: stateless, produces the markdown plan reviewed by Curmudgeon.

use std::path::Path;

use coordination::{
    AllowedTool, LlmProvider, MessageRole, OrchestratorError, OrchestratorResult, ProviderMessage,
    ProviderMode, ProviderRequest, Reporter,
};

use crate::prompts::planner_prompt;

pub async fn plan(
    provider: &dyn LlmProvider,
    cwd: &Path,
    task: &str,
    curmudgeon_feedback: Option<&str>,
    retry_feedback: Option<&str>,
    reporter: &Reporter,
) -> OrchestratorResult<String> {
    reporter.phase(coordination::AgentRole::Planner, "drafting plan");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Plan,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep, AllowedTool::ListDir],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: planner_prompt(task, curmudgeon_feedback, retry_feedback),
        }],
        session_id: None,
        is_initialized: false,
        events: None,
    };

    let response = provider
        .query(request)
        .await
        .map_err(|e| OrchestratorError::ProviderFailure(e.to_string()))?;

    Ok(response.raw)
}
