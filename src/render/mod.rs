//! Document rendering.
//!
//! A recipe is flattened into a [`TemplateView`] of display strings, then a
//! [`Renderer`] turns the view into a document using a named template.

mod html;
mod latex;

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::OutputSettings;
use crate::error::RenderError;
use crate::model::Recipe;

pub const HTML_TEMPLATE: &str = "strangetom_style.html";
pub const LATEX_TEMPLATE: &str = "cookbook_style.tex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Latex,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex => "tex",
        }
    }

    /// Template configured for this format.
    pub fn template<'a>(&self, output: &'a OutputSettings) -> &'a str {
        match self {
            OutputFormat::Html => &output.html_template,
            OutputFormat::Latex => &output.latex_template,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex => "latex",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "latex" | "tex" => Ok(OutputFormat::Latex),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientView {
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub name: String,
    pub preparation: Option<String>,
}

impl IngredientView {
    /// "2 cup flour, sifted"
    pub fn line(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(quantity) = &self.quantity {
            parts.push(quantity);
        }
        if let Some(unit) = &self.unit {
            parts.push(unit);
        }
        parts.push(&self.name);
        let mut line = parts.join(" ");
        if let Some(preparation) = &self.preparation {
            line.push_str(", ");
            line.push_str(preparation);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionView {
    pub step: usize,
    pub text: String,
}

/// Everything a template may show, already formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateView {
    pub title: String,
    pub description: Option<String>,
    pub servings: Option<u32>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub difficulty: Option<String>,
    pub ingredients: Vec<IngredientView>,
    pub instructions: Vec<InstructionView>,
    pub tags: Vec<String>,
    pub source_url: String,
    pub image_url: Option<String>,
    pub max_image_size: u32,
    pub generated_at: String,
}

impl TemplateView {
    pub fn new(recipe: &Recipe, output: &OutputSettings) -> Self {
        TemplateView {
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            servings: recipe.servings,
            prep_time: recipe.prep_time.and_then(format_minutes),
            cook_time: recipe.cook_time.and_then(format_minutes),
            total_time: recipe.total_time.and_then(format_minutes),
            difficulty: recipe.difficulty.map(|d| d.label().to_string()),
            ingredients: recipe
                .ingredients
                .iter()
                .map(|i| IngredientView {
                    quantity: i.quantity.map(format_quantity),
                    unit: i.unit.as_ref().map(|u| u.to_string()),
                    name: i.name.clone(),
                    preparation: i.preparation.clone(),
                })
                .collect(),
            instructions: recipe
                .instructions
                .iter()
                .map(|i| InstructionView {
                    step: i.step,
                    text: i.text.clone(),
                })
                .collect(),
            tags: recipe.tags.iter().cloned().collect(),
            source_url: recipe.source_url.clone(),
            image_url: recipe
                .image_url
                .clone()
                .filter(|_| output.download_images),
            max_image_size: output.max_image_size,
            generated_at: Utc::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// A rendered document, not yet written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub format: OutputFormat,
    pub content: String,
}

pub trait Renderer: Send + Sync {
    fn render(&self, view: &TemplateView, template: &str) -> Result<Document, RenderError>;
}

/// Renders the two templates compiled into the crate.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRenderer;

impl Renderer for BuiltinRenderer {
    fn render(&self, view: &TemplateView, template: &str) -> Result<Document, RenderError> {
        match template {
            HTML_TEMPLATE => Ok(Document {
                format: OutputFormat::Html,
                content: html::render(view),
            }),
            LATEX_TEMPLATE => Ok(Document {
                format: OutputFormat::Latex,
                content: latex::render(view),
            }),
            other => Err(RenderError::UnknownTemplate(other.to_string())),
        }
    }
}

/// "45 min", "1 hr", "1 hr 30 min". Zero is not shown.
pub fn format_minutes(minutes: u32) -> Option<String> {
    match (minutes / 60, minutes % 60) {
        (0, 0) => None,
        (0, m) => Some(format!("{} min", m)),
        (h, 0) => Some(format!("{} hr", h)),
        (h, m) => Some(format!("{} hr {} min", h, m)),
    }
}

const COMMON_FRACTIONS: &[(f64, &str)] = &[
    (0.125, "1/8"),
    (0.25, "1/4"),
    (0.333, "1/3"),
    (0.375, "3/8"),
    (0.5, "1/2"),
    (0.625, "5/8"),
    (0.667, "2/3"),
    (0.75, "3/4"),
    (0.875, "7/8"),
];

/// Kitchen-friendly quantity: whole numbers as is, small amounts as fractions.
pub fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }
    if value < 1.0 {
        let closest = COMMON_FRACTIONS.iter().min_by(|a, b| {
            (a.0 - value)
                .abs()
                .total_cmp(&(b.0 - value).abs())
        });
        if let Some((decimal, fraction)) = closest {
            if (decimal - value).abs() < 0.05 {
                return fraction.to_string();
            }
        }
    }
    let decimals = if value < 10.0 { 2 } else { 1 };
    let text = format!("{:.*}", decimals, value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Lowercase, dash-separated file stem for a title.
pub fn file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    let stem = cleaned
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    let stem: String = stem.chars().take(50).collect();
    if stem.is_empty() {
        "recipe".to_string()
    } else {
        stem
    }
}

/// File stem for the document of one run: the title stem plus a short
/// FNV-1a hash of the source URL, so recipes sharing a title keep separate
/// files and re-running a URL rewrites its own file.
pub fn output_stem(title: &str, source_url: &str) -> String {
    let hash = source_url
        .bytes()
        .fold(0x811c_9dc5_u32, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
        });
    format!("{}-{:08x}", file_stem(title), hash)
}

/// Write `document` to `dir/<stem>.<ext>`, creating `dir` if needed.
pub async fn write_document(
    document: &Document,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf, RenderError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.{}", stem, document.format.extension()));
    tokio::fs::write(&path, &document.content).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Ingredient, Instruction};
    use crate::units::Unit;

    pub(super) fn sample_view() -> TemplateView {
        let recipe = Recipe {
            title: "Fish & Chips".to_string(),
            description: Some("Crispy <and> hot".to_string()),
            servings: Some(4),
            prep_time: Some(20),
            cook_time: Some(90),
            total_time: Some(110),
            difficulty: Some(Difficulty::Medium),
            ingredients: vec![Ingredient {
                name: "Flour".to_string(),
                quantity: Some(0.5),
                unit: Some(Unit::Cup),
                preparation: Some("sifted".to_string()),
                confidence: 0.9,
                original_text: "1/2 cup flour, sifted".to_string(),
            }],
            instructions: vec![Instruction {
                step: 1,
                text: "Fry at 180°C for 5% longer_than usual".to_string(),
                duration_minutes: None,
                temperature: None,
            }],
            tags: ["british".to_string()].into_iter().collect(),
            source_url: "https://example.com/fish?a=1&b=2".to_string(),
            image_url: Some("https://example.com/fish.jpg".to_string()),
            ..Recipe::default()
        };
        TemplateView::new(&recipe, &OutputSettings::default())
    }

    #[test]
    fn test_view_formats_fields() {
        let view = sample_view();
        assert_eq!(view.prep_time.as_deref(), Some("20 min"));
        assert_eq!(view.cook_time.as_deref(), Some("1 hr 30 min"));
        assert_eq!(view.difficulty.as_deref(), Some("Medium"));
        assert_eq!(view.ingredients[0].line(), "1/2 cup Flour, sifted");
        assert_eq!(view.image_url.as_deref(), Some("https://example.com/fish.jpg"));
    }

    #[test]
    fn test_images_can_be_left_out() {
        let output = OutputSettings {
            download_images: false,
            ..OutputSettings::default()
        };
        let recipe = Recipe {
            image_url: Some("https://example.com/a.jpg".to_string()),
            ..Recipe::default()
        };
        assert_eq!(TemplateView::new(&recipe, &output).image_url, None);
    }

    #[test]
    fn test_unknown_template() {
        let result = BuiltinRenderer.render(&sample_view(), "fancy.html");
        assert!(matches!(result, Err(RenderError::UnknownTemplate(name)) if name == "fancy.html"));
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(2.0), "2");
        assert_eq!(format_quantity(0.33), "1/3");
        assert_eq!(format_quantity(0.75), "3/4");
        assert_eq!(format_quantity(1.5), "1.5");
        assert_eq!(format_quantity(473.18), "473.2");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), None);
        assert_eq!(format_minutes(60).as_deref(), Some("1 hr"));
    }

    #[test]
    fn test_output_stem_depends_on_source() {
        let a = output_stem("Chocolate Chip Cookies", "https://a.example/cookies");
        let b = output_stem("Chocolate Chip Cookies", "https://b.example/cookies");
        assert_ne!(a, b);
        assert!(a.starts_with("chocolate-chip-cookies-"));
        assert_eq!(a.len(), "chocolate-chip-cookies-".len() + 8);
        assert_eq!(a, output_stem("Chocolate Chip Cookies", "https://a.example/cookies"));
        // FNV-1a of the empty string is the offset basis
        assert_eq!(output_stem("???", ""), "recipe-811c9dc5");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Fish & Chips: The  Best!"), "fish-chips-the-best");
        assert_eq!(file_stem("???"), "recipe");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("LaTeX".parse::<OutputFormat>(), Ok(OutputFormat::Latex));
        assert!("pdf".parse::<OutputFormat>().is_err());
    }
}
