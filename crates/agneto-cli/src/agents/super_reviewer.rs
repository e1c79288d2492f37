//! SuperReviewer: stateless final gate over the full task diff. Treated
//! as stateless per §4.5 rather than §3's conflicting claim — see
//! `coordination::session`'s module doc and DESIGN.md.

use std::path::Path;

use coordination::{
    extract_json_block, AllowedTool, LlmProvider, MessageRole, OrchestratorResult, ProviderMessage,
    ProviderMode, ProviderRequest, Reporter, SuperReviewerVerdict,
};

use crate::prompts::super_reviewer_prompt;

fn parse_verdict(raw: &str) -> Option<SuperReviewerVerdict> {
    let block = extract_json_block(raw)?;
    serde_json::from_str(block).ok()
}

pub async fn review(
    provider: &dyn LlmProvider,
    cwd: &Path,
    diff: &str,
    reporter: &Reporter,
) -> OrchestratorResult<(SuperReviewerVerdict, String)> {
    reporter.phase(coordination::AgentRole::SuperReviewer, "running final review");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Review,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Grep],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: super_reviewer_prompt(diff),
        }],
        session_id: None,
        is_initialized: false,
        events: None,
    };

    let (verdict, raw) = super::call_with_retry(provider, request, parse_verdict, 2).await?;

    Ok((verdict, raw))
}
