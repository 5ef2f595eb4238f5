use std::time::Duration;

use crate::config::{LlmSettings, ScrapingSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * 2^(attempt - 1)`
    Exponential,
}

/// Retry policy shared by the scraper and the LLM gateway.
///
/// `max_retries` counts extra attempts, so a policy allows `max_retries + 1`
/// calls in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Backoff::None)
    }

    pub fn for_scraping(settings: &ScrapingSettings) -> Self {
        Self::new(settings.max_retries, settings.retry_delay(), Backoff::Linear)
    }

    pub fn for_llm(settings: &LlmSettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.retry_delay_ms),
            Backoff::Linear,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Delay to wait after the 1-based `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
        }
    }
}
