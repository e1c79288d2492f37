//! Agent runners: flattened free async functions, one per role (§4.5,
//! §9 REDESIGN FLAGS — no base struct, no trait object).
//!
//! [`call_with_retry`] is the shared bounded-retry helper used by the
//! two runners that get a JSON-schema verdict back (Reviewer plan/code);
//! Curmudgeon and Bean Counter parse free text defensively and never
//! need a retry loop (`coordination::parse_curmudgeon_verdict` /
//! `parse_bean_counter_output` always return a value).

pub mod bean_counter;
pub mod coder;
pub mod curmudgeon;
pub mod gardener;
pub mod planner;
pub mod refiner;
pub mod reviewer;
pub mod super_reviewer;

use coordination::{
    MessageRole, OrchestratorError, OrchestratorResult, ProviderMessage, ProviderRequest,
};

/// Prepends a dynamically-injected human message to a request, if any
/// (§4.7: "adds it as the leading user message of the next agent
/// invocation"). The injected text is consumed by the caller before
/// this is called — this function only shapes the wire request.
pub fn with_injection(mut request: ProviderRequest, injected: Option<&str>) -> ProviderRequest {
    if let Some(text) = injected {
        request.messages.insert(
            0,
            ProviderMessage {
                role: MessageRole::User,
                content: text.to_string(),
            },
        );
    }
    request
}

/// Bounded re-ask retry loop for any schema-checked verdict parser
/// (§4.5/§7: "locally retried up to 2 times... on exhaustion surface as
/// a needs-human verdict"). `max_retries = 2` satisfies testable
/// property 7 directly: 3 malformed replies exhausts the budget; 2
/// malformed followed by one valid reply still succeeds.
pub async fn call_with_retry<V>(
    provider: &dyn coordination::LlmProvider,
    mut request: ProviderRequest,
    parse: impl Fn(&str) -> Option<V>,
    max_retries: u32,
) -> OrchestratorResult<(V, String)> {
    let mut attempts = 0u32;
    loop {
        let response = provider
            .query(request.clone())
            .await
            .map_err(|e| OrchestratorError::ProviderFailure(e.to_string()))?;

        if let Some(verdict) = parse(&response.raw) {
            return Ok((verdict, response.raw));
        }

        attempts += 1;
        if attempts > max_retries {
            return Err(OrchestratorError::ParseExhausted { attempts });
        }

        tracing::warn!(attempts, "malformed verdict reply, re-asking");
        request.messages.push(ProviderMessage {
            role: MessageRole::User,
            content: "Your reply could not be parsed as the requested JSON object. \
                      Reply again with only that JSON object, nothing else."
                .to_string(),
        });
    }
}
