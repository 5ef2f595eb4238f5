#![allow(dead_code)]

use async_trait::async_trait;
use recipe_agent::providers::CompletionRequest;
use recipe_agent::{FailureReason, Fetcher, LlmProvider, ProviderKind, RawPage, ScrapeError, Settings};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn create_recipe_html(json_ld: &str) -> String {
    format!(
        r#"
        <!DOCTYPE html>
        <html>
        <head>
            <title>Recipe Page</title>
            <script type="application/ld+json">
                {json_ld}
            </script>
        </head>
        <body>
            <h1>Recipe</h1>
        </body>
        </html>
        "#
    )
}

pub fn raw_page(url: &str, title: &str, ingredients: &[&str], steps: &[&str]) -> RawPage {
    let mut page = RawPage::new(url);
    page.title = title.to_string();
    page.ingredient_lines = ingredients.iter().map(|s| s.to_string()).collect();
    page.instruction_lines = steps.iter().map(|s| s.to_string()).collect();
    page
}

/// Serves canned pages by URL. Unknown URLs are `NotFound`.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, Result<RawPage, ScrapeError>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: RawPage) -> Self {
        self.pages.insert(page.url.clone(), Ok(page));
        self
    }

    pub fn error(mut self, url: &str, error: ScrapeError) -> Self {
        self.pages.insert(url.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, ScrapeError> {
        self.pages
            .get(url)
            .cloned()
            .unwrap_or(Err(ScrapeError::NotFound))
    }
}

/// Counts fetch attempts per URL, then answers like the wrapped `StubFetcher`.
pub struct AttemptCountingFetcher {
    inner: StubFetcher,
    attempts: Mutex<HashMap<String, usize>>,
}

impl AttemptCountingFetcher {
    pub fn new(inner: StubFetcher) -> Self {
        Self {
            inner,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempts(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for AttemptCountingFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, ScrapeError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;
        self.inner.fetch(url).await
    }
}

/// Provider that plays back a script of replies, optionally after a delay.
pub struct ScriptedProvider {
    name: &'static str,
    kind: ProviderKind,
    delay: Duration,
    script: Mutex<VecDeque<Result<String, FailureReason>>>,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        name: &'static str,
        kind: ProviderKind,
        script: Vec<Result<String, FailureReason>>,
    ) -> Self {
        Self {
            name,
            kind,
            delay: Duration::ZERO,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
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
        tokio::time::sleep(self.delay).await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FailureReason::Unavailable(503)))
    }
}

/// Settings writing into a fresh directory under the system temp dir.
pub fn settings_in_temp_dir(name: &str) -> Settings {
    let dir: PathBuf = std::env::temp_dir().join(format!(
        "recipe-agent-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);

    let mut settings = Settings::default();
    settings.output.output_dir = dir;
    settings
}
