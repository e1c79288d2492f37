//! Gardener: stateless, updates project notes after a COMPLETE task.
//! Never fatal (§7): a malformed or missing reply only records `error`
//! on the result, it never fails the call or propagates upward —
//! GARDENING_COMPLETE always fires.

use std::path::Path;

use coordination::{
    extract_json_block, AllowedTool, GardenerResult, LlmProvider, MessageRole, ProviderMessage,
    ProviderMode, ProviderRequest, Reporter,
};

use crate::prompts::gardener_prompt;

pub async fn update_notes(
    provider: &dyn LlmProvider,
    cwd: &Path,
    task_summary: &str,
    reporter: &Reporter,
) -> GardenerResult {
    reporter.phase(coordination::AgentRole::Gardener, "updating project notes");

    let request = ProviderRequest {
        cwd: cwd.to_path_buf(),
        mode: ProviderMode::Default,
        allowed_tools: vec![AllowedTool::ReadFile, AllowedTool::Edit, AllowedTool::Write],
        model: None,
        messages: vec![ProviderMessage {
            role: MessageRole::User,
            content: gardener_prompt(task_summary),
        }],
        session_id: None,
        is_initialized: false,
        events: None,
    };

    let response = match provider.query(request).await {
        Ok(r) => r,
        Err(e) => {
            reporter.error(coordination::AgentRole::Gardener, &e.to_string());
            return GardenerResult {
                success: false,
                sections_updated: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    match extract_json_block(&response.raw).and_then(|b| serde_json::from_str(b).ok()) {
        Some(result) => result,
        None => GardenerResult {
            success: false,
            sections_updated: Vec::new(),
            error: Some("gardener reply was not well-formed JSON".to_string()),
        },
    }
}
