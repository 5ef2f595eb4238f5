use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::config::LlmSettings;
use crate::error::{FailureReason, ProviderError, ProviderFailure};
use crate::providers::{CompletionRequest, LlmProvider, ProviderFactory, ProviderKind};
use crate::retry::RetryPolicy;

/// Which provider a call should start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderSelection {
    #[default]
    Default,
    Named(ProviderKind),
}

/// Per-call overrides. Unset fields fall back to the gateway defaults.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub provider: ProviderSelection,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
}

/// A successful completion and what it took to get it.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResult {
    pub text: String,
    pub provider: String,
    pub latency: Duration,
    /// Attempts that failed before the successful one, in order.
    pub failed_attempts: Vec<ProviderFailure>,
}

/// Ordered multi-provider front door with retry, fallback and a global cap on
/// in-flight calls. Shared between runs behind an `Arc`.
pub struct LlmGateway {
    providers: Vec<Box<dyn LlmProvider>>,
    retry: RetryPolicy,
    permits: Semaphore,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl LlmGateway {
    /// `providers` are tried in the order given.
    pub fn new(
        providers: Vec<Box<dyn LlmProvider>>,
        retry: RetryPolicy,
        max_concurrent_calls: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            retry,
            permits: Semaphore::new(max_concurrent_calls.max(1)),
            timeout,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    /// Build the provider chain from settings.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ProviderError> {
        let providers = ProviderFactory::create_ordered(settings);
        if providers.is_empty() {
            return Err(ProviderError::NoProviders(
                "no provider could be initialized from configuration".to_string(),
            ));
        }
        let gateway = Self::new(
            providers,
            RetryPolicy::for_llm(settings),
            settings.max_concurrent_calls,
            settings.timeout(),
        )
        .with_defaults(settings.max_tokens, settings.temperature);
        info!("LLM provider chain: {}", gateway.provider_names().join(" -> "));
        Ok(gateway)
    }

    pub fn with_defaults(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    fn ordered(&self, selection: ProviderSelection) -> Vec<&dyn LlmProvider> {
        let mut order: Vec<&dyn LlmProvider> = self.providers.iter().map(|p| p.as_ref()).collect();
        if let ProviderSelection::Named(kind) = selection {
            match order.iter().position(|p| p.kind() == kind) {
                Some(index) => {
                    let chosen = order.remove(index);
                    order.insert(0, chosen);
                }
                None => warn!("Requested provider '{}' is not configured, using default order", kind),
            }
        }
        order
    }

    /// Run a prompt against the provider chain until one succeeds.
    pub async fn invoke(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<ProviderResult, ProviderError> {
        let order = self.ordered(options.provider);
        if order.is_empty() {
            return Err(ProviderError::NoProviders(
                "gateway has no providers".to_string(),
            ));
        }

        let request = CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            temperature: options.temperature.unwrap_or(self.temperature),
        };
        let call_timeout = options.timeout.unwrap_or(self.timeout);
        let started = Instant::now();
        let mut failures: Vec<ProviderFailure> = Vec::new();

        for provider in order {
            let mut attempt = 1;
            loop {
                debug!(
                    "Calling {} (attempt {}/{})",
                    provider.provider_name(),
                    attempt,
                    self.retry.max_attempts()
                );

                match self.attempt(provider, &request, call_timeout).await {
                    Ok(text) => {
                        info!(
                            "Completion from {} after {} failed attempt(s)",
                            provider.provider_name(),
                            failures.len()
                        );
                        return Ok(ProviderResult {
                            text,
                            provider: provider.provider_name().to_string(),
                            latency: started.elapsed(),
                            failed_attempts: failures,
                        });
                    }
                    Err(reason) => {
                        warn!(
                            "Provider {} failed (attempt {}): {}",
                            provider.provider_name(),
                            attempt,
                            reason
                        );
                        let retry = reason.is_retryable() && self.retry.should_retry(attempt);
                        failures.push(ProviderFailure {
                            provider: provider.provider_name().to_string(),
                            attempt,
                            reason,
                        });
                        if !retry {
                            break;
                        }
                        let delay = self.retry.delay_after(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }

        Err(ProviderError::Exhausted { failures })
    }

    /// One call under the global cap and the per-attempt timeout. The permit
    /// is released before any backoff sleep.
    async fn attempt(
        &self,
        provider: &dyn LlmProvider,
        request: &CompletionRequest,
        call_timeout: Duration,
    ) -> Result<String, FailureReason> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FailureReason::Transport(e.to_string()))?;

        match timeout(call_timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(FailureReason::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct ScriptedProvider {
        name: &'static str,
        kind: ProviderKind,
        delay: Duration,
        script: Mutex<VecDeque<Result<String, FailureReason>>>,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(
            name: &'static str,
            kind: ProviderKind,
            script: Vec<Result<String, FailureReason>>,
        ) -> Self {
            Self {
                name,
                kind,
                delay: Duration::ZERO,
                script: Mutex::new(script.into()),
                calls: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, FailureReason> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default".to_string()))
        }
    }

    fn retry_twice() -> RetryPolicy {
        RetryPolicy::new(
            2,
            Duration::from_millis(100),
            crate::retry::Backoff::Linear,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through_to_next_provider() {
        let slow = ScriptedProvider::new("A", ProviderKind::Anthropic, vec![Ok("late".into())])
            .with_delay(Duration::from_secs(60));
        let fast = ScriptedProvider::new("B", ProviderKind::OpenAi, vec![Ok("fast".into())]);
        let slow_calls = slow.calls.clone();

        let gateway = LlmGateway::new(
            vec![Box::new(slow), Box::new(fast)],
            retry_twice(),
            4,
            Duration::from_secs(5),
        );

        let result = gateway.invoke("prompt", &InvokeOptions::default()).await.unwrap();
        assert_eq!(result.text, "fast");
        assert_eq!(result.provider, "B");
        assert_eq!(
            result.failed_attempts,
            vec![ProviderFailure {
                provider: "A".to_string(),
                attempt: 1,
                reason: FailureReason::Timeout,
            }]
        );
        // Timeouts are not retried on the same provider.
        assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_fail() {
        let a = ScriptedProvider::new(
            "A",
            ProviderKind::Anthropic,
            vec![Err(FailureReason::Transport("connection reset".into()))],
        );
        let b = ScriptedProvider::new(
            "B",
            ProviderKind::OpenAi,
            vec![Err(FailureReason::Rejected {
                status: 401,
                message: "bad key".into(),
            })],
        );
        let gateway = LlmGateway::new(
            vec![Box::new(a), Box::new(b)],
            retry_twice(),
            4,
            Duration::from_secs(5),
        );

        let err = gateway
            .invoke("prompt", &InvokeOptions::default())
            .await
            .unwrap_err();
        match err {
            ProviderError::Exhausted { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider, "A");
                assert!(matches!(failures[0].reason, FailureReason::Transport(_)));
                assert_eq!(failures[1].provider, "B");
                assert!(matches!(
                    failures[1].reason,
                    FailureReason::Rejected { status: 401, .. }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_same_provider() {
        let a = ScriptedProvider::new(
            "A",
            ProviderKind::Anthropic,
            vec![
                Err(FailureReason::RateLimited),
                Err(FailureReason::Unavailable(503)),
                Ok("third time".into()),
            ],
        );
        let b = ScriptedProvider::new("B", ProviderKind::OpenAi, vec![]);
        let b_calls = b.calls.clone();
        let gateway = LlmGateway::new(
            vec![Box::new(a), Box::new(b)],
            retry_twice(),
            4,
            Duration::from_secs(5),
        );

        let result = gateway.invoke("prompt", &InvokeOptions::default()).await.unwrap();
        assert_eq!(result.text, "third time");
        assert_eq!(result.provider, "A");
        assert_eq!(result.failed_attempts.len(), 2);
        assert_eq!(result.failed_attempts[1].attempt, 2);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_retries_then_falls_through() {
        let a = ScriptedProvider::new(
            "A",
            ProviderKind::Anthropic,
            vec![
                Err(FailureReason::RateLimited),
                Err(FailureReason::RateLimited),
                Err(FailureReason::RateLimited),
            ],
        );
        let b = ScriptedProvider::new("B", ProviderKind::OpenAi, vec![Ok("b".into())]);
        let gateway = LlmGateway::new(
            vec![Box::new(a), Box::new(b)],
            retry_twice(),
            4,
            Duration::from_secs(5),
        );

        let result = gateway.invoke("prompt", &InvokeOptions::default()).await.unwrap();
        assert_eq!(result.provider, "B");
        assert_eq!(result.failed_attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_named_provider_goes_first() {
        let a = ScriptedProvider::new("A", ProviderKind::Anthropic, vec![Ok("a".into())]);
        let b = ScriptedProvider::new("B", ProviderKind::OpenAi, vec![Ok("b".into())]);
        let gateway = LlmGateway::new(
            vec![Box::new(a), Box::new(b)],
            RetryPolicy::none(),
            4,
            Duration::from_secs(5),
        );

        let options = InvokeOptions {
            provider: ProviderSelection::Named(ProviderKind::OpenAi),
            ..InvokeOptions::default()
        };
        let result = gateway.invoke("prompt", &options).await.unwrap();
        assert_eq!(result.provider, "B");
        // Only for that call.
        assert_eq!(gateway.provider_names(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_cap_serializes_calls() {
        let provider = ScriptedProvider::new("A", ProviderKind::Anthropic, vec![])
            .with_delay(Duration::from_millis(500));
        let max_in_flight = provider.max_in_flight.clone();
        let gateway = Arc::new(LlmGateway::new(
            vec![Box::new(provider)],
            RetryPolicy::none(),
            1,
            Duration::from_secs(5),
        ));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move {
                gateway.invoke("prompt", &InvokeOptions::default()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let gateway = LlmGateway::new(Vec::new(), RetryPolicy::none(), 1, Duration::from_secs(1));
        let result = gateway.invoke("prompt", &InvokeOptions::default()).await;
        assert!(matches!(result, Err(ProviderError::NoProviders(_))));
    }

    #[test]
    fn test_from_settings_follows_configured_order() {
        let settings = LlmSettings {
            default_provider: ProviderKind::Ollama,
            fallback_order: vec![ProviderKind::Ollama],
            ..LlmSettings::default()
        };
        let gateway = LlmGateway::from_settings(&settings).unwrap();
        assert_eq!(gateway.provider_names(), vec!["ollama"]);
    }
}
