use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::fetcher::Fetcher;
use crate::config::ScrapingSettings;
use crate::error::ScrapeError;
use crate::model::RawPage;
use crate::retry::RetryPolicy;

/// Wraps a `Fetcher` with the size cap, per-fetch timeout and retry policy.
#[derive(Clone)]
pub struct ScraperAgent {
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
    timeout: Duration,
    max_content_length: usize,
}

impl ScraperAgent {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: &ScrapingSettings) -> Self {
        Self {
            fetcher,
            retry: RetryPolicy::for_scraping(settings),
            timeout: settings.timeout(),
            max_content_length: settings.max_content_length,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn scrape(&self, url: &str) -> Result<RawPage, ScrapeError> {
        let mut attempt = 1;
        loop {
            debug!(
                "Fetching {} (attempt {}/{})",
                url,
                attempt,
                self.retry.max_attempts()
            );

            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Fetch of {} failed (attempt {}): {}; retrying in {:?}",
                        url, attempt, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<RawPage, ScrapeError> {
        let page = match timeout(self.timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result?,
            Err(_) => return Err(ScrapeError::Timeout),
        };
        if page.content_length > self.max_content_length {
            return Err(ScrapeError::ContentTooLarge {
                size: page.content_length,
                limit: self.max_content_length,
            });
        }
        Ok(page)
    }
}
