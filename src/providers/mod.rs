mod anthropic;
mod factory;
mod gateway;
mod ollama;
mod open_ai;
mod prompt;

pub use anthropic::AnthropicProvider;
pub use factory::ProviderFactory;
pub use gateway::{InvokeOptions, LlmGateway, ProviderResult, ProviderSelection};
pub use ollama::OllamaProvider;
pub use open_ai::OpenAIProvider;
pub use prompt::{build_reparse_prompt, INGREDIENT_REPARSE_PROMPT};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::FailureReason;

/// The fixed set of providers the gateway knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::Ollama,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown provider: {}", s))
    }
}

/// A single completion request, already resolved against the gateway defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Unified trait for all LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "anthropic")
    fn provider_name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Run one completion. Timeouts are enforced by the gateway.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, FailureReason>;
}

/// Map a non-success HTTP status onto a failure reason.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> FailureReason {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FailureReason::RateLimited
    } else if status.is_server_error() {
        FailureReason::Unavailable(status.as_u16())
    } else {
        let message: String = body.chars().take(200).collect();
        FailureReason::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Send a request and decode the JSON body, classifying every failure.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value, FailureReason> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| FailureReason::MalformedResponse(e.to_string()))
}

/// Pull the completion text out of a decoded response body.
pub(crate) fn extract_text(body: &Value, pointer: &str) -> Result<String, FailureReason> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FailureReason::MalformedResponse(format!("missing {}", pointer)))
}
