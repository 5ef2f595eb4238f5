use crate::config::ProviderSettings;
use crate::error::FailureReason;
use crate::providers::{extract_text, send_json, CompletionRequest, LlmProvider, ProviderKind};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Local models served by Ollama. Needs no API key.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider from configuration
    pub fn new(config: &ProviderSettings) -> Self {
        OllamaProvider {
            client: Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    #[doc(hidden)]
    pub fn with_base_url(base_url: String, model: String) -> Self {
        OllamaProvider {
            client: Client::new(),
            base_url,
            model,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, FailureReason> {
        // Ollama uses OpenAI-compatible API
        let body = send_json(
            self.client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .json(&json!({
                    "model": self.model,
                    "messages": [
                        {"role": "user", "content": request.prompt}
                    ],
                    "temperature": request.temperature,
                    "max_tokens": request.max_tokens
                })),
        )
        .await?;
        debug!("Ollama response: {:?}", body);

        if let Some(error) = body.get("error") {
            return Err(FailureReason::MalformedResponse(error.to_string()));
        }

        extract_text(&body, "/choices/0/message/content")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_complete() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"content": "ok"}}]}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::with_base_url(server.url(), "llama3".to_string());
        let request = CompletionRequest {
            prompt: "hi".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };

        assert_eq!(provider.complete(&request).await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        // Nothing listens on port 9 locally.
        let provider =
            OllamaProvider::with_base_url("http://127.0.0.1:9".to_string(), "llama3".to_string());
        let request = CompletionRequest {
            prompt: "hi".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };

        assert!(matches!(
            provider.complete(&request).await,
            Err(FailureReason::Transport(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let provider = OllamaProvider::new(&ProviderSettings::default());
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model, DEFAULT_MODEL);
    }
}
