pub mod agents;
pub mod config;
pub mod density;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod retry;
pub mod units;

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use agents::{
    Conversion, ConverterAgent, Decision, Fetcher, HttpFetcher, IngredientParser, NormalizerAgent,
    ParserAgent, QualityGate, QualitySettings, QualityVerdict, RuleBasedParser, ScraperAgent,
    StructuredIngredient, UnitPreferences,
};
pub use config::Settings;
pub use error::{
    AgentError, ConversionError, FailureReason, ParseError, PipelineError, ProviderError,
    ProviderFailure, RenderError, ScrapeError, StageFailure, ValidationError,
};
pub use model::{Difficulty, Ingredient, Instruction, RawPage, Recipe, Temperature};
pub use pipeline::{
    BatchCancellation, BatchItem, BatchReport, BatchRunner, EntryStatus, Orchestrator,
    OrchestratorBuilder, PipelineContext, ReportEntry, RunOutcome, RunState, Stage,
};
pub use providers::{InvokeOptions, LlmGateway, LlmProvider, ProviderKind, ProviderResult, ProviderSelection};
pub use render::{BuiltinRenderer, Document, OutputFormat, Renderer, TemplateView};
pub use retry::{Backoff, RetryPolicy};
pub use units::{TemperatureUnit, Unit, UnitKind};

/// An accepted run and the document written for it.
#[derive(Debug, Clone)]
pub struct ProcessedRecipe {
    pub outcome: RunOutcome,
    pub output: PathBuf,
}

/// Run one URL through the pipeline and write the document.
///
/// A failed run returns `AgentError::Pipeline`, a rejected one
/// `AgentError::Validation`.
pub async fn process_url(
    url: &str,
    settings: &Settings,
    format: OutputFormat,
) -> Result<ProcessedRecipe, AgentError> {
    let orchestrator = Orchestrator::builder().settings(settings.clone()).build()?;
    process_with(&orchestrator, url, settings, format).await
}

/// Like [`process_url`], with a caller-built orchestrator.
pub async fn process_with(
    orchestrator: &Orchestrator,
    url: &str,
    settings: &Settings,
    format: OutputFormat,
) -> Result<ProcessedRecipe, AgentError> {
    let outcome = orchestrator.run(url).await;
    match &outcome.state {
        RunState::Failed(failure) => return Err(failure.clone().into()),
        RunState::Rejected => {
            let (score, reasons) = outcome
                .verdict
                .as_ref()
                .map(|v| (v.score, v.reasons.clone()))
                .unwrap_or_default();
            return Err(ValidationError::QualityRejected { score, reasons }.into());
        }
        RunState::Accepted => {}
    }

    let output = render_outcome(&outcome, settings, &BuiltinRenderer, format).await?;
    Ok(ProcessedRecipe { outcome, output })
}

/// Render an accepted run into `output.output_dir`.
pub async fn render_outcome(
    outcome: &RunOutcome,
    settings: &Settings,
    renderer: &dyn Renderer,
    format: OutputFormat,
) -> Result<PathBuf, RenderError> {
    let recipe = outcome
        .recipe
        .as_ref()
        .ok_or_else(|| RenderError::Failed(format!("no recipe for {}", outcome.url)))?;
    let view = TemplateView::new(recipe, &settings.output);
    let document = renderer.render(&view, format.template(&settings.output))?;
    let path = render::write_document(
        &document,
        &settings.output.output_dir,
        &render::output_stem(&recipe.title, &outcome.url),
    )
    .await?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Process every URL listed in `path` and write `batch_report.json`.
pub async fn process_batch_file(
    path: &Path,
    settings: &Settings,
    format: OutputFormat,
) -> Result<BatchReport, AgentError> {
    let urls = load_urls(path).await?;
    let orchestrator = Arc::new(Orchestrator::builder().settings(settings.clone()).build()?);
    let runner = BatchRunner::new(orchestrator, settings.processing.max_concurrent_runs);
    run_batch(&runner, urls, settings, format).await
}

/// Run a batch, render accepted recipes and write the report.
pub async fn run_batch(
    runner: &BatchRunner,
    urls: Vec<String>,
    settings: &Settings,
    format: OutputFormat,
) -> Result<BatchReport, AgentError> {
    let items = runner.run(urls).await;
    let mut report = BatchReport::from_items(&items);

    for (index, item) in items.iter().enumerate() {
        let Some(outcome) = item.outcome().filter(|o| o.is_accepted()) else {
            continue;
        };
        match render_outcome(outcome, settings, &BuiltinRenderer, format).await {
            Ok(path) => report.record_output(index, path),
            Err(e) => {
                warn!("Could not render {}: {}", outcome.url, e);
                report.record_render_error(index, &e);
            }
        }
    }

    let report_path = report.write_to(&settings.output.output_dir).await?;
    info!(
        "Batch done: {} accepted, {} rejected, {} failed, {} cancelled (report: {})",
        report.accepted,
        report.rejected,
        report.failed,
        report.cancelled,
        report_path.display()
    );
    Ok(report)
}

/// Read a line-delimited URL list. Blank lines and `#` comments are skipped.
pub async fn load_urls(path: &Path) -> Result<Vec<String>, AgentError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_url_list(&text))
}

pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
