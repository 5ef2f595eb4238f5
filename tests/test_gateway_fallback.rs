mod common;

use common::ScriptedProvider;
use recipe_agent::providers::{OllamaProvider, OpenAIProvider};
use recipe_agent::{
    FailureReason, InvokeOptions, LlmGateway, ProviderError, ProviderKind, RetryPolicy,
};
use std::time::Duration;

fn chat_reply(content: &str) -> String {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

#[tokio::test]
async fn test_unavailable_local_model_falls_back_to_hosted() {
    let mut local = mockito::Server::new_async().await;
    let local_mock = local
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .with_body("model is loading")
        .create_async()
        .await;

    let mut hosted = mockito::Server::new_async().await;
    let hosted_mock = hosted
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("hello from the hosted model"))
        .create_async()
        .await;

    let gateway = LlmGateway::new(
        vec![
            Box::new(OllamaProvider::with_base_url(
                local.url(),
                "llama3.1:8b".to_string(),
            )),
            Box::new(OpenAIProvider::with_base_url(
                "sk-test".to_string(),
                hosted.url(),
                "gpt-4o-mini".to_string(),
            )),
        ],
        RetryPolicy::none(),
        2,
        Duration::from_secs(10),
    );

    let result = gateway
        .invoke("Say hello", &InvokeOptions::default())
        .await
        .unwrap();

    assert_eq!(result.text, "hello from the hosted model");
    assert_eq!(result.provider, "openai");
    assert_eq!(result.failed_attempts.len(), 1);
    assert_eq!(result.failed_attempts[0].provider, "ollama");
    assert_eq!(
        result.failed_attempts[0].reason,
        FailureReason::Unavailable(503)
    );
    local_mock.assert_async().await;
    hosted_mock.assert_async().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out_and_next_answers() {
    let slow = ScriptedProvider::new(
        "slow",
        ProviderKind::Anthropic,
        vec![Ok("too late".to_string())],
    )
    .with_delay(Duration::from_secs(30));
    let quick = ScriptedProvider::new("quick", ProviderKind::OpenAi, vec![Ok("ok".to_string())]);

    let gateway = LlmGateway::new(
        vec![Box::new(slow), Box::new(quick)],
        RetryPolicy::none(),
        1,
        Duration::from_secs(1),
    );

    let result = gateway
        .invoke("prompt", &InvokeOptions::default())
        .await
        .unwrap();
    assert_eq!(result.text, "ok");
    assert_eq!(result.failed_attempts[0].provider, "slow");
    assert_eq!(result.failed_attempts[0].reason, FailureReason::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_lists_every_attempt() {
    let flaky = ScriptedProvider::new(
        "flaky",
        ProviderKind::Ollama,
        vec![
            Err(FailureReason::RateLimited),
            Err(FailureReason::RateLimited),
        ],
    );
    let broken = ScriptedProvider::new(
        "broken",
        ProviderKind::Anthropic,
        vec![Err(FailureReason::MalformedResponse("empty body".to_string()))],
    );

    let gateway = LlmGateway::new(
        vec![Box::new(flaky), Box::new(broken)],
        RetryPolicy::new(1, Duration::from_millis(200), recipe_agent::Backoff::Exponential),
        1,
        Duration::from_secs(5),
    );

    match gateway.invoke("prompt", &InvokeOptions::default()).await {
        Err(ProviderError::Exhausted { failures }) => {
            let seen: Vec<(&str, u32)> = failures
                .iter()
                .map(|f| (f.provider.as_str(), f.attempt))
                .collect();
            assert_eq!(seen, vec![("flaky", 1), ("flaky", 2), ("broken", 1)]);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}
