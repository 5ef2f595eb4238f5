use serde::Serialize;
use std::fmt;

use crate::config::{ProcessingSettings, QualityWeights};
use crate::model::Recipe;

pub const MISSING_INGREDIENTS: &str = "missing-ingredients";
pub const MISSING_INSTRUCTIONS: &str = "missing-instructions";
pub const MISSING_TITLE: &str = "missing-title";
pub const LOW_CONFIDENCE_INGREDIENTS: &str = "low-confidence-ingredients";
pub const SCORE_BELOW_THRESHOLD: &str = "score-below-threshold";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Warn,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Accept => "accept",
            Decision::Warn => "warn",
            Decision::Reject => "reject",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityVerdict {
    pub score: f64,
    pub decision: Decision,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualitySettings {
    pub min_ingredient_confidence: f64,
    pub min_recipe_quality_score: f64,
    pub require_ingredients: bool,
    pub require_instructions: bool,
    pub weights: QualityWeights,
}

impl QualitySettings {
    pub fn from_settings(settings: &ProcessingSettings) -> Self {
        Self {
            min_ingredient_confidence: settings.min_ingredient_confidence,
            min_recipe_quality_score: settings.min_recipe_quality_score,
            require_ingredients: settings.require_ingredients,
            require_instructions: settings.require_instructions,
            weights: settings.quality_weights,
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::from_settings(&ProcessingSettings::default())
    }
}

/// Scores a finished recipe. Holds no state, so the same recipe always gets
/// the same verdict.
#[derive(Debug, Clone)]
pub struct QualityGate {
    settings: QualitySettings,
}

impl QualityGate {
    pub fn new(settings: QualitySettings) -> Self {
        Self { settings }
    }

    pub fn evaluate(&self, recipe: &Recipe) -> QualityVerdict {
        let settings = &self.settings;
        let mut reasons = Vec::new();

        let confident = recipe
            .ingredients
            .iter()
            .filter(|i| i.confidence >= settings.min_ingredient_confidence)
            .count();
        let confident_fraction = if recipe.ingredients.is_empty() {
            0.0
        } else {
            confident as f64 / recipe.ingredients.len() as f64
        };
        if confident < recipe.ingredients.len() {
            reasons.push(LOW_CONFIDENCE_INGREDIENTS.to_string());
        }

        let mut required = 0;
        let mut present = 0;
        let mut missing_required = false;
        if settings.require_ingredients {
            required += 1;
            if recipe.ingredients.is_empty() {
                reasons.push(MISSING_INGREDIENTS.to_string());
                missing_required = true;
            } else {
                present += 1;
            }
        }
        if settings.require_instructions {
            required += 1;
            if recipe.instructions.is_empty() {
                reasons.push(MISSING_INSTRUCTIONS.to_string());
                missing_required = true;
            } else {
                present += 1;
            }
        }
        let required_fraction = if required == 0 {
            1.0
        } else {
            f64::from(present) / f64::from(required)
        };

        let has_title = !recipe.title.trim().is_empty();
        if !has_title {
            reasons.push(MISSING_TITLE.to_string());
        }

        let weights = settings.weights;
        let total_weight = weights.confidence + weights.required + weights.title;
        let score = if total_weight > 0.0 {
            (weights.confidence * confident_fraction
                + weights.required * required_fraction
                + weights.title * if has_title { 1.0 } else { 0.0 })
                / total_weight
        } else {
            0.0
        };

        let decision = if missing_required {
            Decision::Reject
        } else if score < settings.min_recipe_quality_score {
            reasons.push(SCORE_BELOW_THRESHOLD.to_string());
            Decision::Warn
        } else {
            Decision::Accept
        };

        QualityVerdict {
            score,
            decision,
            reasons,
        }
    }
}
