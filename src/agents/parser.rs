use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::ingredient_parser::{parse_quantity, score_structure, IngredientParser, StructuredIngredient};
use crate::error::ParseError;
use crate::model::{Difficulty, Ingredient, Instruction, RawPage, Recipe, Temperature};
use crate::pipeline::{PipelineContext, Stage};
use crate::providers::{build_reparse_prompt, InvokeOptions, LlmGateway};
use crate::units::{find_temperature_mentions, Unit};

const DIFFICULTY_KEYWORDS: &[(Difficulty, &[&str])] = &[
    (Difficulty::Easy, &["easy", "simple", "quick", "beginner", "basic"]),
    (Difficulty::Medium, &["medium", "intermediate", "moderate"]),
    (
        Difficulty::Hard,
        &["hard", "difficult", "advanced", "complex", "challenging"],
    ),
    (
        Difficulty::Expert,
        &["expert", "professional", "master", "gourmet"],
    ),
];

/// Turns a raw page into an unnormalized, unconverted recipe.
pub struct ParserAgent {
    parser: Arc<dyn IngredientParser>,
    gateway: Option<Arc<LlmGateway>>,
    min_confidence: f64,
}

/// The JSON object a model returns for a re-parse.
#[derive(Debug, Deserialize)]
struct LlmIngredient {
    name: Option<String>,
    quantity: Option<Value>,
    unit: Option<String>,
    preparation: Option<String>,
    confidence: Option<f64>,
}

impl ParserAgent {
    pub fn new(
        parser: Arc<dyn IngredientParser>,
        gateway: Option<Arc<LlmGateway>>,
        min_confidence: f64,
    ) -> Self {
        Self {
            parser,
            gateway,
            min_confidence,
        }
    }

    pub async fn parse(
        &self,
        page: RawPage,
        context: &mut PipelineContext,
    ) -> Result<Recipe, ParseError> {
        if page.is_empty() {
            return Err(ParseError::EmptyPage);
        }

        let mut ingredients = Vec::with_capacity(page.ingredient_lines.len());
        for line in page.ingredient_lines.iter().filter(|l| !l.trim().is_empty()) {
            ingredients.push(self.parse_ingredient(line, context).await);
        }

        let instructions = parse_instructions(&page.instruction_lines);
        let difficulty = determine_difficulty(&page, instructions.len());
        let tags: BTreeSet<String> = page
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        debug!(
            "Parsed {} ingredients and {} steps from {}",
            ingredients.len(),
            instructions.len(),
            page.url
        );

        Ok(Recipe {
            title: page.title.trim().to_string(),
            description: page.description.clone(),
            servings: page.servings.as_deref().and_then(parse_servings),
            prep_time: page.prep_time.as_deref().and_then(parse_minutes),
            cook_time: page.cook_time.as_deref().and_then(parse_minutes),
            total_time: page.total_time.as_deref().and_then(parse_minutes),
            difficulty: Some(difficulty),
            ingredients,
            instructions,
            tags,
            source_url: page.url,
            author: page.author,
            image_url: page.image_url,
            quality_score: None,
        })
    }

    /// Parse one line, asking the gateway once if the parser is unsure.
    async fn parse_ingredient(&self, line: &str, context: &mut PipelineContext) -> Ingredient {
        let parsed = match self.parser.parse(line) {
            Ok((structured, confidence)) => structured.into_ingredient(confidence, line),
            Err(e) => {
                context.warn(Stage::Parsing, e.to_string());
                Ingredient::unknown(line)
            }
        };

        if parsed.confidence >= self.min_confidence {
            return parsed;
        }
        let Some(gateway) = &self.gateway else {
            context.warn(
                Stage::Parsing,
                format!(
                    "Low confidence ({:.2}) for '{}' and no LLM available",
                    parsed.confidence,
                    line.trim()
                ),
            );
            return parsed;
        };

        let options = InvokeOptions {
            temperature: Some(0.0),
            max_tokens: Some(300),
            ..InvokeOptions::default()
        };
        let result = match gateway.invoke(&build_reparse_prompt(line), &options).await {
            Ok(result) => result,
            Err(e) => {
                context.warn(
                    Stage::Parsing,
                    format!("LLM re-parse of '{}' failed, keeping parser result: {}", line.trim(), e),
                );
                return parsed;
            }
        };

        match parse_llm_response(&result.text) {
            Some((structured, reported)) => {
                let confidence = reported.min(score_structure(&structured));
                if confidence >= self.min_confidence {
                    info!(
                        "LLM re-parse via {} accepted for '{}' ({:.2})",
                        result.provider,
                        line.trim(),
                        confidence
                    );
                    structured.into_ingredient(confidence, line)
                } else {
                    context.warn(
                        Stage::Parsing,
                        format!(
                            "LLM re-parse of '{}' below threshold ({:.2}), keeping parser result",
                            line.trim(),
                            confidence
                        ),
                    );
                    parsed
                }
            }
            None => {
                context.warn(
                    Stage::Parsing,
                    format!(
                        "LLM re-parse of '{}' returned no usable JSON, keeping parser result",
                        line.trim()
                    ),
                );
                parsed
            }
        }
    }
}

/// Read the structured answer out of a completion, tolerating code fences
/// and prose around the JSON object.
fn parse_llm_response(text: &str) -> Option<(StructuredIngredient, f64)> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let raw: LlmIngredient = serde_json::from_str(&text[start..=end]).ok()?;

    let name = raw.name?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let quantity = match raw.quantity {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_quantity(&s),
        _ => None,
    };
    let unit = raw
        .unit
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && !u.eq_ignore_ascii_case("null"))
        .map(Unit::from);
    let preparation = raw
        .preparation
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    Some((
        StructuredIngredient {
            name,
            quantity,
            unit,
            preparation,
        },
        raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    ))
}

fn parse_instructions(lines: &[String]) -> Vec<Instruction> {
    lines
        .iter()
        .filter_map(|line| clean_instruction(line))
        .enumerate()
        .map(|(index, text)| Instruction {
            step: index + 1,
            duration_minutes: extract_duration(&text),
            temperature: find_temperature_mentions(&text)
                .first()
                .map(|m| Temperature {
                    value: m.value,
                    unit: m.unit,
                }),
            text,
        })
        .collect()
}

/// Strip leading numbering and bullets ("1.", "2)", "Step 3:", "-", "•", "*")
/// and collapse whitespace. Blank results are dropped.
fn clean_instruction(line: &str) -> Option<String> {
    let mut text = line.trim();
    text = text.trim_start_matches(['-', '•', '*', '–', '·']).trim_start();

    if text.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("step")) {
        let after = text[4..].trim_start();
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 {
            text = after[digits..]
                .trim_start_matches([':', '.', ')', '-'])
                .trim_start();
        }
    } else {
        let digits = text.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 && text[digits..].starts_with(['.', ')']) {
            let after = &text[digits + 1..];
            // "1.5 cups" is not a step number
            if !after.starts_with(|c: char| c.is_ascii_digit()) {
                text = after.trim_start();
            }
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Duration of the first "N minutes" / "N hours" phrase, adding a directly
/// following minutes part ("1 hour 30 minutes").
fn extract_duration(text: &str) -> Option<u32> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '/')
                .trim_end_matches('.')
                .to_lowercase()
        })
        .collect();

    let mut i = 0;
    while i + 1 < words.len() {
        if let (Some(value), Some(factor)) = (leading_number(&words[i]), time_factor(&words[i + 1])) {
            let mut minutes = value * factor;
            if factor == 60.0 && i + 3 < words.len() {
                if let (Some(extra), Some(next)) =
                    (leading_number(&words[i + 2]), time_factor(&words[i + 3]))
                {
                    if next == 1.0 {
                        minutes += extra;
                    }
                }
            }
            return Some(minutes.round() as u32);
        }
        i += 1;
    }
    None
}

/// "10" -> 10, "10-12" -> 10, "1/2" -> 0.5
fn leading_number(word: &str) -> Option<f64> {
    let head = word.split(['-', '–']).next().unwrap_or(word);
    parse_quantity(head)
}

fn time_factor(word: &str) -> Option<f64> {
    match word {
        "minute" | "minutes" | "min" | "mins" => Some(1.0),
        "hour" | "hours" | "hr" | "hrs" => Some(60.0),
        "second" | "seconds" | "sec" | "secs" => Some(1.0 / 60.0),
        _ => None,
    }
}

/// Minutes from an ISO-8601 duration ("PT1H30M", "P0DT45M", "PT5400.0S") or
/// free text ("1 hour 30 minutes", "45 mins", "20").
pub fn parse_minutes(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(iso) = text.strip_prefix(['P', 'p']) {
        if iso.starts_with(|c: char| c.is_ascii_digit() || c == 'T' || c == 't') {
            return parse_iso_duration(iso);
        }
    }

    if let Ok(minutes) = text.parse::<f64>() {
        return Some(minutes.round() as u32);
    }

    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '.').to_lowercase())
        .collect();
    let mut total = 0.0;
    let mut found = false;
    for pair in words.windows(2) {
        if let (Some(value), Some(factor)) = (leading_number(&pair[0]), time_factor(&pair[1])) {
            total += value * factor;
            found = true;
        }
    }
    found.then(|| total.round() as u32)
}

fn parse_iso_duration(iso: &str) -> Option<u32> {
    let mut total_minutes = 0.0;
    let mut number = String::new();
    let mut in_time = false;
    let mut any = false;

    for c in iso.chars() {
        match c.to_ascii_uppercase() {
            'T' => in_time = true,
            d if d.is_ascii_digit() || d == '.' => number.push(d),
            unit => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                total_minutes += match (unit, in_time) {
                    ('D', false) => value * 24.0 * 60.0,
                    ('W', false) => value * 7.0 * 24.0 * 60.0,
                    ('H', true) => value * 60.0,
                    ('M', true) => value,
                    ('S', true) => value / 60.0,
                    _ => return None,
                };
                any = true;
            }
        }
    }

    if any && number.is_empty() {
        Some(total_minutes.round() as u32)
    } else {
        None
    }
}

/// First integer in a yield text ("4 servings", "Serves 6", "12").
fn parse_servings(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// Keyword match on title, description and steps; falls back to step count.
fn determine_difficulty(page: &RawPage, step_count: usize) -> Difficulty {
    let mut text = page.title.to_lowercase();
    if let Some(description) = &page.description {
        text.push(' ');
        text.push_str(&description.to_lowercase());
    }
    for line in &page.instruction_lines {
        text.push(' ');
        text.push_str(&line.to_lowercase());
    }
    let words: BTreeSet<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (difficulty, keywords) in DIFFICULTY_KEYWORDS {
        if keywords.iter().any(|k| words.contains(k)) {
            return *difficulty;
        }
    }

    if step_count > 15 {
        Difficulty::Hard
    } else if step_count > 10 {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}
