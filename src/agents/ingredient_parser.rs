//! Ingredient line parsing.
//!
//! Splits raw ingredient lines (e.g., "2 cups flour, sifted") into quantity,
//! unit, name and preparation, and scores how clean the split is.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::ParseError;
use crate::model::{Ingredient, UNKNOWN_INGREDIENT};
use crate::units::Unit;

/// The parts of one ingredient line, before any confidence is attached.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredIngredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    pub preparation: Option<String>,
}

impl StructuredIngredient {
    pub fn into_ingredient(self, confidence: f64, original_text: &str) -> Ingredient {
        Ingredient {
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            preparation: self.preparation,
            confidence: confidence.clamp(0.0, 1.0),
            original_text: original_text.to_string(),
        }
    }
}

/// Splits a single ingredient line. Implementations may be statistical; the
/// returned confidence is their own certainty in [0, 1].
pub trait IngredientParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<(StructuredIngredient, f64), ParseError>;
}

/// Phrases standing in for a quantity.
const UNQUANTIFIED: &[&str] = &["to taste", "as needed", "as required", "for garnish", "for serving"];

/// Unit spellings, longest first so "tablespoons" wins over "tb".
static UNITS_SORTED: LazyLock<Vec<&'static str>> = LazyLock::new(Unit::spellings);

const VULGAR_FRACTIONS: &[(char, &str)] = &[
    ('¼', "1/4"),
    ('½', "1/2"),
    ('¾', "3/4"),
    ('⅓', "1/3"),
    ('⅔', "2/3"),
    ('⅕', "1/5"),
    ('⅛', "1/8"),
    ('⅜', "3/8"),
    ('⅝', "5/8"),
    ('⅞', "7/8"),
];

/// Deterministic splitter. Its confidence is `score_structure` of its output.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedParser;

impl IngredientParser for RuleBasedParser {
    fn parse(&self, text: &str) -> Result<(StructuredIngredient, f64), ParseError> {
        let structured = split_line(text)?;
        let confidence = score_structure(&structured);
        Ok((structured, confidence))
    }
}

/// Score how clean a split looks. Used for every parser result and as the
/// cap on LLM re-parses, so both paths are measured the same way.
pub fn score_structure(ingredient: &StructuredIngredient) -> f64 {
    let name = ingredient.name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN_INGREDIENT) {
        return 0.0;
    }

    let mut score: f64 = 0.5;
    if ingredient.quantity.is_some() {
        score += 0.2;
    }
    match (&ingredient.unit, ingredient.quantity) {
        (Some(unit), _) if unit.is_custom() => score += 0.1,
        (Some(_), _) => score += 0.2,
        (None, Some(_)) => score += 0.15,
        (None, None) => {
            if ingredient
                .preparation
                .as_deref()
                .is_some_and(is_unquantified_phrase)
            {
                score += 0.3;
            }
        }
    }
    if name.chars().any(|c| c.is_ascii_digit()) {
        score -= 0.3;
    }
    if name.split_whitespace().count() > 5 {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

fn is_unquantified_phrase(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    UNQUANTIFIED.iter().any(|phrase| lower == *phrase)
}

fn split_line(text: &str) -> Result<StructuredIngredient, ParseError> {
    let cleaned = collapse_whitespace(&expand_vulgar_fractions(text));
    if !cleaned.chars().any(char::is_alphabetic) {
        return Err(ParseError::UnparseableLine(text.trim().to_string()));
    }

    let without_parens = strip_measurement_parentheticals(&cleaned);
    let (quantity, rest) = extract_amount(&without_parens);
    let (unit, rest) = extract_unit(&rest);
    let rest = rest
        .strip_prefix("of ")
        .map(str::to_string)
        .unwrap_or(rest);
    let (name, preparation) = split_preparation(&rest);

    let name = name.trim().trim_end_matches([',', ';']).trim().to_string();
    if name.is_empty() || !name.chars().any(char::is_alphabetic) {
        return Err(ParseError::UnparseableLine(text.trim().to_string()));
    }

    Ok(StructuredIngredient {
        name,
        quantity,
        unit,
        preparation,
    })
}

fn expand_vulgar_fractions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match VULGAR_FRACTIONS.iter().find(|(f, _)| *f == c) {
            Some((_, ascii)) => {
                out.push(' ');
                out.push_str(ascii);
                out.push(' ');
            }
            None if c == '⁄' => out.push('/'),
            None => out.push(c),
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop alternative measurements such as "(113 g)" from "1 stick (113 g) butter".
fn strip_measurement_parentheticals(text: &str) -> String {
    let mut result = text.to_string();
    let mut search_from = 0;
    while let Some(offset) = result[search_from..].find('(') {
        let start = search_from + offset;
        let Some(len) = result[start..].find(')') else {
            break;
        };
        let inner = &result[start + 1..start + len];
        if inner.trim_start().starts_with(|c: char| c.is_ascii_digit()) {
            let before = result[..start].trim_end().to_string();
            let after = result[start + len + 1..].trim_start().to_string();
            result = if before.is_empty() || after.is_empty() {
                format!("{}{}", before, after)
            } else {
                format!("{} {}", before, after)
            };
            search_from = before.len().min(result.len());
        } else {
            search_from = start + len + 1;
        }
    }
    result
}

/// Parse a quantity such as "2", "2.5", "1/2", "1 1/2" or "2-3" (lower bound).
pub(crate) fn parse_quantity(text: &str) -> Option<f64> {
    let (amount, rest) = extract_amount(&expand_vulgar_fractions(text));
    if rest.trim().is_empty() {
        amount
    } else {
        None
    }
}

fn parse_fraction(word: &str) -> Option<f64> {
    let (numerator, denominator) = word.split_once('/')?;
    let numerator: f64 = numerator.parse().ok()?;
    let denominator: f64 = denominator.parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

fn is_fraction(word: &str) -> bool {
    match word.split_once('/') {
        Some((before, after)) => {
            !before.is_empty()
                && !after.is_empty()
                && before.chars().all(|c| c.is_ascii_digit())
                && after.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Extract an amount from the beginning of a string.
/// Returns (amount, remaining_string).
fn extract_amount(s: &str) -> (Option<f64>, String) {
    let s = s.trim();
    let words: Vec<&str> = s.split_whitespace().collect();

    // Mixed number: "1 1/2"
    if words.len() >= 2 && words[0].chars().all(|c| c.is_ascii_digit()) && is_fraction(words[1])
    {
        if let (Ok(whole), Some(fraction)) = (words[0].parse::<f64>(), parse_fraction(words[1])) {
            return (Some(whole + fraction), words[2..].join(" "));
        }
    }

    // Fraction: "1/2"
    if let Some(first) = words.first() {
        if is_fraction(first) {
            return (parse_fraction(first), words[1..].join(" "));
        }
    }

    // Decimal or integer, possibly a range "2-3" or glued to the unit "200g"
    let number: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if number.is_empty() || number == "." {
        return (None, s.to_string());
    }
    let Ok(value) = number.parse::<f64>() else {
        return (None, s.to_string());
    };

    let mut rest = &s[number.len()..];
    let range_tail = rest
        .trim_start()
        .strip_prefix('-')
        .or_else(|| rest.trim_start().strip_prefix("to "));
    if let Some(tail) = range_tail {
        let tail = tail.trim_start();
        let upper: String = tail
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '/')
            .collect();
        if !upper.is_empty() {
            rest = &tail[upper.len()..];
        }
    }

    (Some(value), rest.trim().to_string())
}

/// Extract a unit from the beginning of a string.
/// Returns (unit, remaining_string).
fn extract_unit(s: &str) -> (Option<Unit>, String) {
    let s = s.trim();

    for &spelling in UNITS_SORTED.iter() {
        let n = spelling.len();
        if !s.get(..n).is_some_and(|head| head.eq_ignore_ascii_case(spelling)) {
            continue;
        }
        let after = &s[n..];
        // Make sure it's a word boundary
        if after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '.' || c == ',')
        {
            let rest = after.trim_start_matches('.').trim();
            return (Unit::parse(spelling), rest.to_string());
        }
    }

    (None, s.to_string())
}

/// Preparation is the text after the last comma, or a trailing unquantified
/// phrase such as "to taste".
fn split_preparation(text: &str) -> (String, Option<String>) {
    if let Some((name, note)) = text.rsplit_once(',') {
        let note = note.trim();
        if !note.is_empty() && name.chars().any(char::is_alphabetic) {
            return (name.trim().to_string(), Some(note.to_string()));
        }
    }

    for phrase in UNQUANTIFIED {
        let Some(cut) = text.len().checked_sub(phrase.len()) else {
            continue;
        };
        if !text.get(cut..).is_some_and(|tail| tail.eq_ignore_ascii_case(phrase)) {
            continue;
        }
        let name = text[..cut].trim();
        if !name.is_empty() {
            return (name.to_string(), Some((*phrase).to_string()));
        }
    }

    (text.trim().to_string(), None)
}
