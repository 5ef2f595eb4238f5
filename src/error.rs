use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::pipeline::Stage;

/// Failures of the Scraper Agent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("Timed out fetching page")]
    Timeout,

    #[error("Page not found")]
    NotFound,

    #[error("Unsupported site: {0}")]
    UnsupportedSite(String),

    #[error("Content too large: {size} bytes exceeds limit of {limit} bytes")]
    ContentTooLarge { size: usize, limit: usize },

    /// Transport-level failure worth retrying (connection reset, 5xx, 429).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ScrapeError {
    /// Transient failures are retried; everything else fails the stage at once.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::Timeout | ScrapeError::Network(_))
    }
}

/// Why a single provider attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("service unavailable (HTTP {0})")]
    Unavailable(u16),

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FailureReason {
    /// Worth another attempt on the same provider after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::RateLimited | FailureReason::Unavailable(_))
    }
}

impl From<reqwest::Error> for FailureReason {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FailureReason::Timeout
        } else if err.is_decode() {
            FailureReason::MalformedResponse(err.to_string())
        } else {
            FailureReason::Transport(err.to_string())
        }
    }
}

/// One failed attempt against one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub attempt: u32,
    pub reason: FailureReason,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (attempt {}): {}", self.provider, self.attempt, self.reason)
    }
}

/// Failures of the LLM gateway as a whole. Per-attempt timeouts and rate
/// limits are recorded as `FailureReason`s inside `Exhausted`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("All providers failed:\n{}", format_failures(.failures))]
    Exhausted { failures: Vec<ProviderFailure> },

    #[error("No LLM providers available: {0}")]
    NoProviders(String),
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Never fatal; degrades to a zero-confidence ingredient.
    #[error("Unparseable line: {0}")]
    UnparseableLine(String),

    #[error("Page has no title, ingredients or instructions")]
    EmptyPage,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Quality gate rejected recipe: {}", .reasons.join(", "))]
    QualityRejected { score: f64, reasons: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// Never fatal; the ingredient is kept as-is and flagged.
    #[error("No conversion for {ingredient} ({unit})")]
    NonConvertibleUnit { ingredient: String, unit: String },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Render failed: {0}")]
    Failed(String),

    #[error("Failed to write document: {0}")]
    Io(#[from] std::io::Error),
}

/// A stage-level error that sent a run to `Failed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    /// Error family name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Scrape(_) => "ScrapeError",
            PipelineError::Parse(_) => "ParseError",
        }
    }
}

/// A failed run: where it stopped and why.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    pub error: PipelineError,
}

/// Errors surfaced by the library entry points.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Builder error: {0}")]
    BuilderError(String),

    #[error(transparent)]
    Pipeline(#[from] StageFailure),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to initialize HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
