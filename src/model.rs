use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::units::{TemperatureUnit, Unit};

/// Name given to a line that could not be split into parts.
pub const UNKNOWN_INGREDIENT: &str = "unknown";

/// The unprocessed page fetched for a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub ingredient_lines: Vec<String>,
    pub instruction_lines: Vec<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub servings: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    /// Keywords, category and cuisine as published by the site.
    pub tags: Vec<String>,
    pub content_length: usize,
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    pub fn new(url: impl Into<String>) -> Self {
        RawPage {
            url: url.into(),
            title: String::new(),
            description: None,
            ingredient_lines: Vec::new(),
            instruction_lines: Vec::new(),
            prep_time: None,
            cook_time: None,
            total_time: None,
            servings: None,
            author: None,
            image_url: None,
            tags: Vec::new(),
            content_length: 0,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.ingredient_lines.iter().all(|l| l.trim().is_empty())
            && self.instruction_lines.iter().all(|l| l.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    pub preparation: Option<String>,
    /// Parser certainty in the quantity/unit/name split, in [0, 1].
    pub confidence: f64,
    pub original_text: String,
}

impl Ingredient {
    /// Placeholder for a line that could not be split at all.
    pub fn unknown(original_text: impl Into<String>) -> Self {
        Ingredient {
            name: UNKNOWN_INGREDIENT.to_string(),
            quantity: None,
            unit: None,
            preparation: None,
            confidence: 0.0,
            original_text: original_text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TemperatureUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// 1-based position in the recipe.
    pub step: usize,
    pub text: String,
    pub duration_minutes: Option<u32>,
    pub temperature: Option<Temperature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The unit of identity flowing through the pipeline. Stages take a recipe by
/// value and hand back a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Recipe {
    pub title: String,
    pub description: Option<String>,
    pub servings: Option<u32>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub total_time: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<Instruction>,
    pub tags: BTreeSet<String>,
    pub source_url: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub quality_score: Option<f64>,
}
