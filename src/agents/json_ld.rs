//! schema.org/Recipe extraction from JSON-LD script blocks.

use crate::model::RawPage;
use html_escape::decode_html_entities;
use log::debug;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct JsonLdRecipe {
    #[serde(default)]
    name: Option<String>,
    description: Option<DescriptionType>,
    image: Option<ImageType>,
    #[serde(rename = "recipeIngredient", alias = "ingredients")]
    recipe_ingredient: Option<RecipeIngredients>,
    #[serde(rename = "recipeInstructions")]
    recipe_instructions: Option<RecipeInstructions>,
    #[serde(rename = "recipeYield")]
    recipe_yield: Option<RecipeYield>,
    #[serde(rename = "prepTime")]
    prep_time: Option<String>,
    #[serde(rename = "cookTime")]
    cook_time: Option<String>,
    #[serde(rename = "totalTime")]
    total_time: Option<String>,
    #[serde(rename = "recipeCategory")]
    recipe_category: Option<StringOrMany>,
    #[serde(rename = "recipeCuisine")]
    recipe_cuisine: Option<StringOrMany>,
    keywords: Option<StringOrMany>,
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TextObject {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptionType {
    String(String),
    Object(TextObject),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageType {
    String(String),
    Object(ImageObject),
    MultipleStrings(Vec<String>),
    MultipleObjects(Vec<ImageObject>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeIngredients {
    Strings(Vec<String>),
    Single(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeInstructions {
    String(String),
    Multiple(Vec<String>),
    HowTo(Vec<HowTo>),
    NestedSections(Vec<Vec<HowTo>>),
    MultipleObject(Vec<TextObject>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "@type")]
enum HowTo {
    HowToStep(HowToStep),
    HowToSection(HowToSection),
}

#[derive(Debug, Deserialize)]
struct HowToStep {
    text: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HowToSection {
    #[serde(rename = "itemListElement", default)]
    item_list_element: Vec<HowToStep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeYield {
    String(String),
    Number(f64),
    Array(Vec<Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrMany {
    String(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Author {
    String(String),
    Object(AuthorObject),
    Multiple(Vec<AuthorObject>),
}

#[derive(Debug, Deserialize)]
struct AuthorObject {
    name: Option<String>,
}

impl HowToStep {
    /// Prefer text over name
    fn into_text(self) -> Option<String> {
        self.text.or(self.name)
    }
}

impl HowTo {
    fn into_lines(self) -> Vec<String> {
        match self {
            HowTo::HowToStep(step) => step.into_text().into_iter().collect(),
            HowTo::HowToSection(section) => section
                .item_list_element
                .into_iter()
                .filter_map(HowToStep::into_text)
                .collect(),
        }
    }
}

impl RecipeInstructions {
    fn into_lines(self) -> Vec<String> {
        match self {
            // A single blob is split on line breaks; sites often publish
            // every step in one string.
            RecipeInstructions::String(text) => text.lines().map(str::to_string).collect(),
            RecipeInstructions::Multiple(steps) => steps,
            RecipeInstructions::HowTo(items) => {
                items.into_iter().flat_map(HowTo::into_lines).collect()
            }
            RecipeInstructions::NestedSections(sections) => sections
                .into_iter()
                .flatten()
                .flat_map(HowTo::into_lines)
                .collect(),
            RecipeInstructions::MultipleObject(objects) => {
                objects.into_iter().map(|o| o.text).collect()
            }
        }
    }
}

impl StringOrMany {
    /// Comma-separated strings are split into separate entries.
    fn into_items(self) -> Vec<String> {
        let items = match self {
            StringOrMany::String(s) => vec![s],
            StringOrMany::Multiple(v) => v,
        };
        items
            .iter()
            .flat_map(|item| item.split(','))
            .map(|item| decode_html_symbols(item.trim()))
            .filter(|item| !item.is_empty())
            .collect()
    }
}

fn decode_html_symbols(text: &str) -> String {
    // for some reason need to decode twice to get the correct string
    decode_html_entities(&decode_html_entities(text)).into_owned()
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn sanitize_json(json_str: &str) -> String {
    let mut cleaned = json_str.trim().to_string();

    // Handle cases where there might be leading junk before the JSON
    if !cleaned.starts_with('{') && !cleaned.starts_with('[') {
        if let Some(start) = cleaned.find(['{', '[']) {
            cleaned = cleaned[start..].to_string();
        }
    }

    // Remove any trailing comma followed by closing brace/bracket
    cleaned = cleaned.replace(",]", "]").replace(",}", "}");

    // Remove any HTML comments that might be present
    cleaned.replace("<!--", "").replace("-->", "")
}

/// `@type` may be a string or an array of strings.
fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case("recipe")),
        _ => false,
    }
}

fn find_recipe(json_ld: &Value) -> Option<&Value> {
    if let Some(items) = json_ld.as_array() {
        return items.iter().find_map(find_recipe);
    }
    if is_recipe_type(json_ld) {
        return Some(json_ld);
    }
    json_ld
        .get("@graph")
        .and_then(Value::as_array)
        .and_then(|graph| graph.iter().find(|item| is_recipe_type(item)))
}

fn into_raw_page(recipe: JsonLdRecipe, url: &str) -> RawPage {
    let mut page = RawPage::new(url);

    page.title = recipe
        .name
        .map(|n| decode_html_symbols(&n))
        .unwrap_or_default()
        .trim()
        .to_string();
    page.description = recipe
        .description
        .map(|d| match d {
            DescriptionType::String(s) => decode_html_symbols(&s),
            DescriptionType::Object(o) => decode_html_symbols(&o.text),
        })
        .and_then(non_empty);

    page.ingredient_lines = match recipe.recipe_ingredient {
        Some(RecipeIngredients::Strings(lines)) => lines,
        Some(RecipeIngredients::Single(line)) => line.lines().map(str::to_string).collect(),
        None => Vec::new(),
    }
    .iter()
    .map(|line| decode_html_symbols(line))
    .collect();

    page.instruction_lines = recipe
        .recipe_instructions
        .map(RecipeInstructions::into_lines)
        .unwrap_or_default()
        .iter()
        .map(|line| decode_html_symbols(line))
        .collect();

    page.prep_time = recipe.prep_time.and_then(non_empty);
    page.cook_time = recipe.cook_time.and_then(non_empty);
    page.total_time = recipe.total_time.and_then(non_empty);

    page.servings = recipe
        .recipe_yield
        .and_then(|y| match y {
            RecipeYield::String(s) => Some(s),
            RecipeYield::Number(n) => Some(n.to_string()),
            // For arrays, prefer the descriptive version ("4 servings") over just the number
            RecipeYield::Array(values) => {
                let texts: Vec<String> = values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                texts
                    .iter()
                    .find(|s| s.contains(char::is_alphabetic))
                    .or_else(|| texts.first())
                    .cloned()
            }
        })
        .and_then(non_empty);

    page.author = recipe
        .author
        .and_then(|a| match a {
            Author::String(name) => Some(name),
            Author::Object(obj) => obj.name,
            Author::Multiple(authors) => {
                let names: Vec<String> = authors.into_iter().filter_map(|a| a.name).collect();
                if names.is_empty() {
                    None
                } else {
                    Some(names.join(", "))
                }
            }
        })
        .map(|name| decode_html_symbols(&name))
        .and_then(non_empty);

    // Use the first image if multiple are available
    page.image_url = recipe
        .image
        .and_then(|img| match img {
            ImageType::String(s) => Some(s),
            ImageType::Object(o) => Some(o.url),
            ImageType::MultipleStrings(v) => v.into_iter().next(),
            ImageType::MultipleObjects(v) => v.into_iter().next().map(|o| o.url),
        })
        .map(|url| decode_html_symbols(&url))
        .and_then(non_empty);

    page.tags = [recipe.keywords, recipe.recipe_category, recipe.recipe_cuisine]
        .into_iter()
        .flatten()
        .flat_map(StringOrMany::into_items)
        .collect();

    page
}

/// Find the first schema.org Recipe in the document's JSON-LD blocks.
pub fn extract_recipe(html: &str, url: &str) -> Option<RawPage> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;

    for (index, script) in document.select(&selector).enumerate() {
        let cleaned = sanitize_json(&script.inner_html());
        let json_ld = match serde_json::from_str::<Value>(&cleaned) {
            Ok(value) => value,
            Err(e) => {
                debug!("JSON-LD block {} is not valid JSON: {}", index, e);
                continue;
            }
        };

        let Some(recipe_json) = find_recipe(&json_ld) else {
            debug!("JSON-LD block {} has no Recipe", index);
            continue;
        };

        match serde_json::from_value::<JsonLdRecipe>(recipe_json.clone()) {
            Ok(recipe) => return Some(into_raw_page(recipe, url)),
            Err(e) => debug!("JSON-LD block {} Recipe did not deserialize: {}", index, e),
        }
    }

    None
}
