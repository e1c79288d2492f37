//! Curmudgeon: stateless plan-complexity critic. No JSON contract — the
//! reply is parsed defensively via `coordination::parse_curmudgeon_verdict`,
//! which always returns a value (§7: a non-response is treated as
//! "skip review", not an error).

use std::path::Path;

use coordination::{
    parse_curmudgeon_verdict, AllowedTool, CurmudgeonVerdict, LlmProvider, MessageRole,
    OrchestratorError, OrchestratorResult, ProviderMessage, ProviderMode, ProviderRequest, Reporter,
};

use crate::prompts::curmudgeon_prompt;

pub async fn review(
    provider: &dyn LlmProvider,
    cwd: &Path,
    plan_markdown: &str,
    injected: Option<&str>,
    reporter: &Reporter,
) -> OrchestratorResult<(CurmudgeonVerdict, String)> {
    reporter.phase(coordination::AgentRole::Curmudgeon, "reviewing plan for complexity");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Review,
        allowed_tools: vec![AllowedTool::ReadFile],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: curmudgeon_prompt(plan_markdown),
        }],
        session_id: None,
        is_initialized: false,
        events: None,
    };
    let request = super::with_injection(request, injected);

    let response = provider
        .query(request)
        .await
        .map_err(|e| OrchestratorError::ProviderFailure(e.to_string()))?;

    let verdict = parse_curmudgeon_verdict(&response.raw);
    Ok((verdict, response.raw))
}
