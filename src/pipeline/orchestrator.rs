use log::{debug, error, info, warn};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::time::Instant;

use super::context::{PipelineContext, Stage};
use crate::agents::{
    Conversion, ConverterAgent, Decision, Fetcher, HttpFetcher, IngredientParser, NormalizerAgent,
    ParserAgent, QualityGate, QualitySettings, QualityVerdict, RuleBasedParser, ScraperAgent,
    UnitPreferences,
};
use crate::config::Settings;
use crate::error::{AgentError, PipelineError, StageFailure};
use crate::model::{RawPage, Recipe};
use crate::providers::LlmGateway;
use crate::retry::RetryPolicy;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Accepted,
    Rejected,
    Failed(StageFailure),
}

impl RunState {
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Accepted => "accepted",
            RunState::Rejected => "rejected",
            RunState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Failed(failure) => write!(f, "failed ({})", failure),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub url: String,
    pub state: RunState,
    pub recipe: Option<Recipe>,
    pub verdict: Option<QualityVerdict>,
    pub context: PipelineContext,
}

impl RunOutcome {
    pub fn is_accepted(&self) -> bool {
        self.state == RunState::Accepted
    }
}

/// Pipeline position. Each step owns the payload for its stage.
enum Step {
    Fetching,
    Parsing(RawPage),
    Normalizing(Recipe),
    Converting(Recipe),
    Gating(Recipe),
}

type Finished = (RunState, Option<QualityVerdict>);

impl Step {
    fn stage(&self) -> Stage {
        match self {
            Step::Fetching => Stage::Fetching,
            Step::Parsing(_) => Stage::Parsing,
            Step::Normalizing(_) => Stage::Normalizing,
            Step::Converting(_) => Stage::Converting,
            Step::Gating(_) => Stage::Gating,
        }
    }
}

/// Sequences the agents for a single URL. Holds no per-run state, so one
/// instance can serve many concurrent runs.
pub struct Orchestrator {
    scraper: ScraperAgent,
    parser: ParserAgent,
    normalizer: NormalizerAgent,
    converter: ConverterAgent,
    gate: QualityGate,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn new(
        scraper: ScraperAgent,
        parser: ParserAgent,
        normalizer: NormalizerAgent,
        converter: ConverterAgent,
        gate: QualityGate,
    ) -> Self {
        Self {
            scraper,
            parser,
            normalizer,
            converter,
            gate,
        }
    }

    /// Run the full pipeline for `url`. Never returns an error: failures are
    /// reported through `RunOutcome::state`.
    pub async fn run(&self, url: &str) -> RunOutcome {
        let mut context = PipelineContext::new();
        let mut step = Step::Fetching;

        let (state, verdict) = loop {
            let stage = step.stage();
            debug!("{}: {}", url, stage);
            let started = Instant::now();
            let next = self.advance(step, url, &mut context).await;
            context.record_timing(stage, started.elapsed());
            match next {
                ControlFlow::Continue(next) => step = next,
                ControlFlow::Break(done) => break done,
            }
        };

        match &state {
            RunState::Accepted => info!(
                "Accepted {} (score {:.2}, {} warnings)",
                url,
                verdict.as_ref().map_or(0.0, |v| v.score),
                context.warnings.len()
            ),
            RunState::Rejected => info!(
                "Rejected {}: {}",
                url,
                verdict
                    .as_ref()
                    .map(|v| v.reasons.join(", "))
                    .unwrap_or_default()
            ),
            RunState::Failed(failure) => error!("{}: {}", url, failure),
        }

        RunOutcome {
            url: url.to_string(),
            recipe: context.recipe.clone(),
            state,
            verdict,
            context,
        }
    }

    async fn advance(
        &self,
        step: Step,
        url: &str,
        context: &mut PipelineContext,
    ) -> ControlFlow<Finished, Step> {
        let next = match step {
            Step::Fetching => match self.scraper.scrape(url).await {
                Ok(page) => Step::Parsing(page),
                Err(e) => return fail(context, Stage::Fetching, e.into()),
            },
            Step::Parsing(page) => match self.parser.parse(page, context).await {
                Ok(recipe) => {
                    context.recipe = Some(recipe.clone());
                    Step::Normalizing(recipe)
                }
                Err(e) => return fail(context, Stage::Parsing, e.into()),
            },
            Step::Normalizing(recipe) => {
                let recipe = self.normalizer.normalize(recipe);
                context.recipe = Some(recipe.clone());
                Step::Converting(recipe)
            }
            Step::Converting(recipe) => {
                let Conversion {
                    recipe,
                    non_convertible,
                    approximations,
                } = self.converter.convert(recipe);
                for problem in non_convertible {
                    context.warn(Stage::Converting, problem.to_string());
                }
                for approximation in approximations {
                    context.warn(Stage::Converting, approximation.to_string());
                }
                context.recipe = Some(recipe.clone());
                Step::Gating(recipe)
            }
            Step::Gating(mut recipe) => {
                let verdict = self.gate.evaluate(&recipe);
                recipe.quality_score = Some(verdict.score);
                let state = match verdict.decision {
                    Decision::Accept => RunState::Accepted,
                    Decision::Warn => {
                        context.warn(
                            Stage::Gating,
                            format!(
                                "Quality score {:.2} below threshold: {}",
                                verdict.score,
                                verdict.reasons.join(", ")
                            ),
                        );
                        RunState::Accepted
                    }
                    Decision::Reject => RunState::Rejected,
                };
                context.recipe = Some(recipe);
                return ControlFlow::Break((state, Some(verdict)));
            }
        };
        ControlFlow::Continue(next)
    }
}

fn fail(context: &mut PipelineContext, stage: Stage, error: PipelineError) -> ControlFlow<Finished, Step> {
    let failure = StageFailure { stage, error };
    context.failure = Some(failure.clone());
    ControlFlow::Break((RunState::Failed(failure), None))
}

/// Builder for an [`Orchestrator`]. Anything not injected is built from
/// the settings.
#[derive(Default)]
pub struct OrchestratorBuilder {
    settings: Option<Settings>,
    fetcher: Option<Arc<dyn Fetcher>>,
    parser: Option<Arc<dyn IngredientParser>>,
    gateway: Option<Arc<LlmGateway>>,
    without_llm: bool,
    scrape_retry: Option<RetryPolicy>,
}

impl OrchestratorBuilder {
    /// Use these settings instead of `Settings::default()`
    ///
    /// # Example
    /// ```
    /// use recipe_agent::{Orchestrator, Settings};
    ///
    /// let builder = Orchestrator::builder().settings(Settings::default());
    /// ```
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the HTTP fetcher, e.g. with a stub in tests.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the rule-based ingredient parser.
    pub fn ingredient_parser(mut self, parser: Arc<dyn IngredientParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Share an existing gateway, so several orchestrators draw from one
    /// concurrency cap.
    pub fn gateway(mut self, gateway: Arc<LlmGateway>) -> Self {
        self.gateway = Some(gateway);
        self.without_llm = false;
        self
    }

    /// Never re-parse through an LLM. Low-confidence lines only warn.
    ///
    /// # Example
    /// ```
    /// use recipe_agent::Orchestrator;
    ///
    /// let orchestrator = Orchestrator::builder().without_llm().build();
    /// assert!(orchestrator.is_ok());
    /// ```
    pub fn without_llm(mut self) -> Self {
        self.gateway = None;
        self.without_llm = true;
        self
    }

    pub fn scrape_retry(mut self, retry: RetryPolicy) -> Self {
        self.scrape_retry = Some(retry);
        self
    }

    pub fn build(self) -> Result<Orchestrator, AgentError> {
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&settings.scraping)?),
        };
        let mut scraper = ScraperAgent::new(fetcher, &settings.scraping);
        if let Some(retry) = self.scrape_retry {
            scraper = scraper.with_retry(retry);
        }

        let gateway = match (self.gateway, self.without_llm) {
            (Some(gateway), _) => Some(gateway),
            (None, true) => None,
            (None, false) => match LlmGateway::from_settings(&settings.llm) {
                Ok(gateway) => Some(Arc::new(gateway)),
                Err(e) => {
                    warn!("LLM re-parse disabled: {}", e);
                    None
                }
            },
        };
        let parser = ParserAgent::new(
            self.parser.unwrap_or_else(|| Arc::new(RuleBasedParser)),
            gateway,
            settings.processing.min_ingredient_confidence,
        );

        Ok(Orchestrator::new(
            scraper,
            parser,
            NormalizerAgent::from_settings(&settings.processing),
            ConverterAgent::new(UnitPreferences::from_settings(&settings.processing)),
            QualityGate::new(QualitySettings::from_settings(&settings.processing)),
        ))
    }
}
