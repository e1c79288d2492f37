//! Reviewer: stateful for the whole task, one session spanning both
//! the plan review and the code review of every chunk (§4.5) so the
//! code review inherits the plan it already approved.

use std::path::Path;

use coordination::{
    parse_code_verdict, parse_plan_verdict, AllowedTool, CodeVerdict, LlmProvider, MessageRole,
    OrchestratorResult, PlanProposal, PlanVerdict, ProviderMessage, ProviderMode, ProviderRequest,
    Reporter, SessionHandle,
};

use crate::prompts::{reviewer_code_prompt, reviewer_plan_prompt};

pub async fn review_plan(
    provider: &dyn LlmProvider,
    session: &mut SessionHandle,
    cwd: &Path,
    plan: &PlanProposal,
    reporter: &Reporter,
) -> OrchestratorResult<(PlanVerdict, String)> {
    reporter.phase(coordination::AgentRole::Reviewer, "reviewing plan");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Review,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: reviewer_plan_prompt(plan),
        }],
        session_id: Some(session.session_id.clone()),
        is_initialized: session.is_initialized,
        events: None,
    };

    let (verdict, raw) = super::call_with_retry(provider, request, parse_plan_verdict, 2).await?;
    session.mark_initialized();

    Ok((verdict, raw))
}

pub async fn review_code(
    provider: &dyn LlmProvider,
    session: &mut SessionHandle,
    cwd: &Path,
    diff: &str,
    is_last_chunk: bool,
    reporter: &Reporter,
) -> OrchestratorResult<(CodeVerdict, String)> {
    reporter.phase(coordination::AgentRole::Reviewer, "reviewing code");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Review,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: reviewer_code_prompt(diff, is_last_chunk),
        }],
        session_id: Some(session.session_id.clone()),
        is_initialized: session.is_initialized,
        events: None,
    };

    let (verdict, raw) = super::call_with_retry(provider, request, parse_code_verdict, 2).await?;
    session.mark_initialized();

    Ok((verdict, raw))
}
