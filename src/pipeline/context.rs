use log::warn;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::StageFailure;
use crate::model::Recipe;

/// Processing stages in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Parsing,
    Normalizing,
    Converting,
    Gating,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Normalizing => "normalizing",
            Stage::Converting => "converting",
            Stage::Gating => "gating",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A non-fatal problem recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub stage: Stage,
    pub message: String,
}

/// Everything one run accumulates. Owned by exactly one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub recipe: Option<Recipe>,
    pub warnings: Vec<Warning>,
    pub timings: Vec<(Stage, Duration)>,
    pub failure: Option<StageFailure>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        warn!("[{}] {}", stage, message);
        self.warnings.push(Warning { stage, message });
    }

    pub fn record_timing(&mut self, stage: Stage, elapsed: Duration) {
        self.timings.push((stage, elapsed));
    }

    pub fn warnings_for(&self, stage: Stage) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.stage == stage)
    }

    pub fn total_time(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_kept_per_stage() {
        let mut context = PipelineContext::new();
        context.warn(Stage::Parsing, "low confidence");
        context.warn(Stage::Converting, "pinch is not convertible");
        context.warn(Stage::Parsing, "gateway exhausted");

        assert_eq!(context.warnings.len(), 3);
        assert_eq!(context.warnings_for(Stage::Parsing).count(), 2);
        assert_eq!(context.warnings_for(Stage::Gating).count(), 0);
    }

    #[test]
    fn test_total_time() {
        let mut context = PipelineContext::new();
        context.record_timing(Stage::Fetching, Duration::from_millis(300));
        context.record_timing(Stage::Parsing, Duration::from_millis(200));
        assert_eq!(context.total_time(), Duration::from_millis(500));
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Gating).unwrap(), "\"gating\"");
        assert_eq!(Stage::Fetching.to_string(), "fetching");
    }
}
