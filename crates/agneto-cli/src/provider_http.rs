//! Concrete `LlmProvider`: an OpenAI-compatible HTTP chat-completions
//! endpoint. Modeled on the teacher's `config.rs` `Endpoint` (url/model/
//! api_key read from env vars with documented fallbacks) — the provider
//! itself is out of scope (§1), this is just enough wiring for `main.rs`
//! to have a concrete type to hand the orchestrator.

use async_trait::async_trait;
use coordination::{LlmProvider, ProviderError, ProviderRequest, ProviderResponse};
use serde::{Deserialize, Serialize};

pub struct HttpLlmProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl HttpLlmProvider {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: std::env::var("AGNETO_PROVIDER_URL").unwrap_or_else(|_| "http://localhost:8080/v1".into()),
            model: std::env::var("AGNETO_PROVIDER_MODEL").unwrap_or_else(|_| "default".into()),
            api_key: std::env::var("AGNETO_PROVIDER_API_KEY").unwrap_or_else(|_| "not-needed".into()),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn query(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let messages: Vec<ChatMessage> = request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    coordination::MessageRole::System => "system",
                    coordination::MessageRole::User => "user",
                },
                content: &m.content,
            })
            .collect();

        let model = request.model.as_deref().unwrap_or(&self.model);
        let started = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model, messages })
            .send()
            .await
            .map_err(|e| ProviderError::CallFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::CallFailed(e.to_string()))?
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::CallFailed(e.to_string()))?;

        let raw = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::CallFailed("empty choices array".to_string()))?;

        if let Some(sender) = &request.events {
            let _ = sender.send(coordination::AgentEvent::Progress { delta: raw.clone() });
            let _ = sender.send(coordination::AgentEvent::Complete {
                cost: 0.0,
                duration_ms: started.elapsed().as_millis() as u64,
                tokens: response.usage.unwrap_or_default().total_tokens,
            });
        }

        Ok(ProviderResponse {
            raw,
            cost: 0.0,
            duration_ms: started.elapsed().as_millis() as u64,
            tokens: 0,
        })
    }
}
