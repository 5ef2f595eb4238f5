//! Deterministic canonicalization of a parsed recipe.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ProcessingSettings;
use crate::model::{Ingredient, Instruction, Recipe};

const ENHANCEMENTS: &[(&str, &str)] = &[("til", "until"), ("thru", "through"), ("&", "and")];

#[derive(Debug, Clone, Default)]
pub struct NormalizerAgent {
    aliases: BTreeMap<String, String>,
    normalize_ingredients: bool,
    enhance_instructions: bool,
}

impl NormalizerAgent {
    pub fn new(
        aliases: BTreeMap<String, String>,
        normalize_ingredients: bool,
        enhance_instructions: bool,
    ) -> Self {
        // Keys and targets are compared lowercase.
        let aliases = aliases
            .into_iter()
            .map(|(k, v)| (collapse(&k).to_lowercase(), collapse(&v).to_lowercase()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        Self {
            aliases,
            normalize_ingredients,
            enhance_instructions,
        }
    }

    pub fn from_settings(settings: &ProcessingSettings) -> Self {
        Self::new(
            settings.ingredient_aliases.clone(),
            settings.enable_ingredient_normalization,
            settings.enable_instruction_enhancement,
        )
    }

    /// Agent that only does the whitespace cleanup.
    pub fn whitespace_only() -> Self {
        Self::default()
    }

    pub fn normalize(&self, recipe: Recipe) -> Recipe {
        let Recipe {
            title,
            description,
            servings,
            prep_time,
            cook_time,
            total_time,
            difficulty,
            ingredients,
            instructions,
            tags,
            source_url,
            author,
            image_url,
            quality_score,
        } = recipe;

        let ingredients = ingredients
            .into_iter()
            .map(|i| self.normalize_ingredient(i))
            .collect();

        let instructions = instructions
            .into_iter()
            .filter_map(|i| {
                let text = collapse(&i.text);
                let text = if self.enhance_instructions {
                    enhance(&text)
                } else {
                    text
                };
                (!text.is_empty()).then_some(Instruction { text, ..i })
            })
            .enumerate()
            .map(|(index, i)| Instruction {
                step: index + 1,
                ..i
            })
            .collect();

        let total_time = total_time.or(match (prep_time, cook_time) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0) + cook.unwrap_or(0)),
        });

        let tags: BTreeSet<String> = tags
            .iter()
            .map(|t| collapse(t).to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        Recipe {
            title: collapse(&title),
            description: description.map(|d| collapse(&d)).filter(|d| !d.is_empty()),
            servings,
            prep_time,
            cook_time,
            total_time,
            difficulty,
            ingredients: merge_duplicates(ingredients),
            instructions,
            tags,
            source_url,
            author: author.map(|a| collapse(&a)),
            image_url,
            quality_score,
        }
    }

    fn normalize_ingredient(&self, ingredient: Ingredient) -> Ingredient {
        let collapsed = collapse(&ingredient.name);
        let name = if self.normalize_ingredients {
            title_case(&self.resolve(&collapsed.to_lowercase()))
        } else {
            collapsed
        };
        let preparation = ingredient
            .preparation
            .map(|p| collapse(&p).to_lowercase())
            .filter(|p| !p.is_empty());

        Ingredient {
            name,
            preparation,
            ..ingredient
        }
    }

    /// Follow alias links until a name with no alias. A cycle resolves to
    /// its smallest member so every name on it maps to the same result.
    fn resolve(&self, name: &str) -> String {
        let mut seen: Vec<&str> = Vec::new();
        let mut current = match self.aliases.get_key_value(name) {
            Some((key, _)) => key.as_str(),
            None => return name.to_string(),
        };

        loop {
            if let Some(position) = seen.iter().position(|n| *n == current) {
                return seen[position..]
                    .iter()
                    .min()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| current.to_string());
            }
            seen.push(current);
            match self.aliases.get(current) {
                Some(next) => current = next.as_str(),
                None => return current.to_string(),
            }
        }
    }
}

/// Merge entries with the same name and unit. Quantities are summed,
/// confidence is the lowest of the group, and the first entry's position wins.
fn merge_duplicates(ingredients: Vec<Ingredient>) -> Vec<Ingredient> {
    let mut merged: Vec<Ingredient> = Vec::with_capacity(ingredients.len());
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();

    for ingredient in ingredients {
        let key = (
            ingredient.name.to_lowercase(),
            ingredient.unit.as_ref().map(|u| u.as_str().to_string()),
        );
        match index.get(&key) {
            Some(&position) => {
                let existing = &mut merged[position];
                existing.quantity = match (existing.quantity, ingredient.quantity) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
                existing.confidence = existing.confidence.min(ingredient.confidence);
                if existing.preparation.is_none() {
                    existing.preparation = ingredient.preparation;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(ingredient);
            }
        }
    }
    merged
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capitalize each word. A first letter whose uppercase form is more than one
/// character ("ß") stays as it is, so the result is stable under reprocessing.
fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            let Some(first) = chars.next() else {
                return String::new();
            };
            let mut upper = first.to_uppercase();
            let first = match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => first,
            };
            std::iter::once(first).chain(chars).collect()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn enhance(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let core = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '&');
            let tail = &word[core.len()..];
            match ENHANCEMENTS
                .iter()
                .find(|(from, _)| core.eq_ignore_ascii_case(from))
            {
                Some((_, to)) => format!("{}{}", to, tail),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    fn ingredient(name: &str, quantity: Option<f64>, unit: Option<Unit>, confidence: f64) -> Ingredient {
        Ingredient {
            name: name.to_string(),
            quantity,
            unit,
            preparation: None,
            confidence,
            original_text: name.to_string(),
        }
    }

    fn aliases(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample() -> Recipe {
        Recipe {
            title: "  Pancakes   for  two ".to_string(),
            prep_time: Some(10),
            cook_time: Some(15),
            ingredients: vec![
                ingredient("All-Purpose  Flour", Some(1.0), Some(Unit::Cup), 0.9),
                ingredient("AP flour", Some(0.5), Some(Unit::Cup), 0.7),
                ingredient("scallions", None, None, 0.8),
                ingredient("green onion", Some(2.0), None, 0.85),
            ],
            instructions: vec![
                Instruction {
                    step: 1,
                    text: "Whisk  til smooth & glossy.".to_string(),
                    duration_minutes: None,
                    temperature: None,
                },
                Instruction {
                    step: 2,
                    text: "   ".to_string(),
                    duration_minutes: None,
                    temperature: None,
                },
                Instruction {
                    step: 3,
                    text: "Cook thru.".to_string(),
                    duration_minutes: Some(3),
                    temperature: None,
                },
            ],
            tags: ["Breakfast ".to_string()].into_iter().collect(),
            ..Recipe::default()
        }
    }

    fn agent() -> NormalizerAgent {
        NormalizerAgent::new(
            aliases(&[
                ("ap flour", "all-purpose flour"),
                ("scallions", "green onion"),
                ("green onion", "spring onion"),
            ]),
            true,
            true,
        )
    }

    #[test]
    fn test_normalize() {
        let recipe = agent().normalize(sample());

        assert_eq!(recipe.title, "Pancakes for two");
        assert_eq!(recipe.total_time, Some(25));
        assert_eq!(recipe.tags.iter().next().map(String::as_str), Some("breakfast"));

        // "scallions" and "green onion" both chain to "spring onion"
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "All-purpose Flour");
        assert_eq!(recipe.ingredients[0].quantity, Some(1.5));
        assert_eq!(recipe.ingredients[0].confidence, 0.7);
        assert_eq!(recipe.ingredients[1].name, "Spring Onion");
        assert_eq!(recipe.ingredients[1].quantity, Some(2.0));
        assert_eq!(recipe.ingredients[1].confidence, 0.8);
        assert_eq!(recipe.ingredients[1].original_text, "scallions");

        assert_eq!(recipe.instructions.len(), 2);
        assert_eq!(recipe.instructions[0].text, "Whisk until smooth and glossy.");
        assert_eq!(recipe.instructions[1].step, 2);
        assert_eq!(recipe.instructions[1].text, "Cook through.");
        assert_eq!(recipe.instructions[1].duration_minutes, Some(3));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let agent = agent();
        let once = agent.normalize(sample());
        let twice = agent.normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_title_case_keeps_expanding_letters() {
        assert_eq!(title_case("ßpecial salt"), "ßpecial Salt");
        assert_eq!(title_case("ŉ crème fraîche"), "ŉ Crème Fraîche");

        let agent = agent();
        let recipe = Recipe {
            title: "Brezel".to_string(),
            ingredients: vec![ingredient("ßpecial  salt", Some(1.0), Some(Unit::Teaspoon), 0.9)],
            ..Recipe::default()
        };
        let once = agent.normalize(recipe);
        assert_eq!(once.ingredients[0].name, "ßpecial Salt");
        assert_eq!(agent.normalize(once.clone()), once);
    }

    #[test]
    fn test_alias_cycle_resolves_to_smallest_member() {
        let agent = NormalizerAgent::new(
            aliases(&[("coriander", "cilantro"), ("cilantro", "coriander")]),
            true,
            false,
        );
        assert_eq!(agent.resolve("coriander"), "cilantro");
        assert_eq!(agent.resolve("cilantro"), "cilantro");
        assert_eq!(agent.resolve("parsley"), "parsley");
    }

    #[test]
    fn test_whitespace_only_keeps_names() {
        let recipe = NormalizerAgent::whitespace_only().normalize(sample());
        assert_eq!(recipe.ingredients[0].name, "All-Purpose Flour");
        assert_eq!(recipe.ingredients[1].name, "AP flour");
        assert_eq!(recipe.instructions[0].text, "Whisk til smooth & glossy.");
    }

    #[test]
    fn test_enhance_keeps_punctuation() {
        assert_eq!(enhance("Bake til golden."), "Bake until golden.");
        assert_eq!(enhance("Stir thru, then rest"), "Stir through, then rest");
        assert_eq!(enhance("tilt the pan"), "tilt the pan");
    }
}
