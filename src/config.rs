use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;
use crate::providers::ProviderKind;
use crate::units::{TemperatureUnit, Unit, UnitKind};

const ENV_PREFIX: &str = "RECIPE_AGENT";

/// Complete, typed configuration. Missing keys take defaults and unknown keys
/// are ignored.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub scraping: ScrapingSettings,
    #[serde(default)]
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// LLM gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmSettings {
    /// Provider tried first when a call does not name one
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,
    /// Providers tried after the default, in order
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<ProviderKind>,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub ollama: ProviderSettings,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout: u64,
    /// Extra attempts on the same provider for rate-limited or unavailable responses
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Global cap on in-flight provider calls across all runs
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

/// Configuration for a specific LLM provider
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProviderSettings {
    /// Model identifier; each provider has its own default
    pub model: Option<String>,
    /// API key (can also be set via ANTHROPIC_API_KEY / OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// Base URL for custom or proxy endpoints
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapingSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Fetch timeout in seconds
    #[serde(default = "default_scrape_timeout")]
    pub timeout: u64,
    #[serde(default = "default_scrape_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    /// Largest page accepted, in bytes
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingSettings {
    #[serde(default = "default_min_ingredient_confidence")]
    pub min_ingredient_confidence: f64,
    #[serde(default = "default_min_recipe_quality_score")]
    pub min_recipe_quality_score: f64,
    #[serde(default = "default_volume_unit")]
    pub preferred_volume_unit: Unit,
    #[serde(default = "default_weight_unit")]
    pub preferred_weight_unit: Unit,
    #[serde(default = "default_temperature_unit")]
    pub preferred_temperature_unit: TemperatureUnit,
    #[serde(default = "default_true")]
    pub require_ingredients: bool,
    #[serde(default = "default_true")]
    pub require_instructions: bool,
    #[serde(default = "default_true")]
    pub enable_ingredient_normalization: bool,
    #[serde(default = "default_true")]
    pub enable_instruction_enhancement: bool,
    #[serde(default)]
    pub quality_weights: QualityWeights,
    /// Lowercase alias -> canonical ingredient name
    #[serde(default)]
    pub ingredient_aliases: BTreeMap<String, String>,
    /// Rewrite volume amounts of ingredients with a known density as weights
    #[serde(default)]
    pub convert_volume_to_weight: bool,
    /// Lowercase ingredient name -> grams per US cup, on top of the built-in table
    #[serde(default)]
    pub ingredient_densities: BTreeMap<String, f64>,
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    #[serde(default)]
    pub temperature_precision: u32,
    /// Pipelines run at once by the batch runner
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

/// Relative weights of the quality score components
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct QualityWeights {
    #[serde(default = "default_confidence_weight")]
    pub confidence: f64,
    #[serde(default = "default_required_weight")]
    pub required: f64,
    #[serde(default = "default_title_weight")]
    pub title: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_html_template")]
    pub html_template: String,
    #[serde(default = "default_latex_template")]
    pub latex_template: String,
    /// Reference the source image in rendered documents
    #[serde(default = "default_true")]
    pub download_images: bool,
    /// Maximum rendered image width in pixels
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u32,
}

// Default value functions
fn default_provider() -> ProviderKind {
    ProviderKind::Anthropic
}

fn default_fallback_order() -> Vec<ProviderKind> {
    vec![ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::Ollama]
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_llm_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_concurrent_calls() -> usize {
    4
}

fn default_user_agent() -> String {
    "RecipeAgent/1.0 (Educational Use)".to_string()
}

fn default_scrape_timeout() -> u64 {
    10
}

fn default_scrape_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_max_content_length() -> usize {
    10 * 1024 * 1024
}

fn default_min_ingredient_confidence() -> f64 {
    0.7
}

fn default_min_recipe_quality_score() -> f64 {
    0.6
}

fn default_volume_unit() -> Unit {
    Unit::Cup
}

fn default_weight_unit() -> Unit {
    Unit::Gram
}

fn default_temperature_unit() -> TemperatureUnit {
    TemperatureUnit::Fahrenheit
}

fn default_true() -> bool {
    true
}

fn default_quantity_precision() -> u32 {
    2
}

fn default_max_concurrent_runs() -> usize {
    4
}

fn default_confidence_weight() -> f64 {
    0.5
}

fn default_required_weight() -> f64 {
    0.3
}

fn default_title_weight() -> f64 {
    0.2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_html_template() -> String {
    "strangetom_style.html".to_string()
}

fn default_latex_template() -> String {
    "cookbook_style.tex".to_string()
}

fn default_max_image_size() -> u32 {
    800
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            fallback_order: default_fallback_order(),
            anthropic: ProviderSettings::default(),
            openai: ProviderSettings::default(),
            ollama: ProviderSettings::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_llm_timeout(),
            max_retries: default_llm_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

impl LlmSettings {
    pub fn provider(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Ollama => &self.ollama,
        }
    }

    /// Default provider first, then the fallback order, without duplicates.
    pub fn provider_order(&self) -> Vec<ProviderKind> {
        let mut order = vec![self.default_provider];
        for kind in &self.fallback_order {
            if !order.contains(kind) {
                order.push(*kind);
            }
        }
        order
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for ScrapingSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_scrape_timeout(),
            max_retries: default_scrape_max_retries(),
            retry_delay: default_retry_delay(),
            max_content_length: default_max_content_length(),
        }
    }
}

impl ScrapingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Zero when the configured value is negative, not finite or too large.
    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay).unwrap_or(Duration::ZERO)
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            min_ingredient_confidence: default_min_ingredient_confidence(),
            min_recipe_quality_score: default_min_recipe_quality_score(),
            preferred_volume_unit: default_volume_unit(),
            preferred_weight_unit: default_weight_unit(),
            preferred_temperature_unit: default_temperature_unit(),
            require_ingredients: true,
            require_instructions: true,
            enable_ingredient_normalization: true,
            enable_instruction_enhancement: true,
            quality_weights: QualityWeights::default(),
            ingredient_aliases: BTreeMap::new(),
            convert_volume_to_weight: false,
            ingredient_densities: BTreeMap::new(),
            quantity_precision: default_quantity_precision(),
            temperature_precision: 0,
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            confidence: default_confidence_weight(),
            required: default_required_weight(),
            title: default_title_weight(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            html_template: default_html_template(),
            latex_template: default_latex_template(),
            download_images: true,
            max_image_size: default_max_image_size(),
        }
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_AGENT__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_AGENT__LLM__DEFAULT_PROVIDER
    pub fn load() -> Result<Self, AgentError> {
        let settings = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::finish(settings)
    }

    /// Parse settings from TOML text, without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, AgentError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(settings)
    }

    fn finish(config: Config) -> Result<Self, AgentError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        let processing = &self.processing;
        if processing.preferred_volume_unit.kind() != UnitKind::Volume {
            return Err(AgentError::InvalidSettings(format!(
                "preferred_volume_unit '{}' is not a volume unit",
                processing.preferred_volume_unit
            )));
        }
        if processing.preferred_weight_unit.kind() != UnitKind::Weight {
            return Err(AgentError::InvalidSettings(format!(
                "preferred_weight_unit '{}' is not a weight unit",
                processing.preferred_weight_unit
            )));
        }
        for (name, value) in [
            ("min_ingredient_confidence", processing.min_ingredient_confidence),
            ("min_recipe_quality_score", processing.min_recipe_quality_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AgentError::InvalidSettings(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        let weights = processing.quality_weights;
        if weights.confidence < 0.0 || weights.required < 0.0 || weights.title < 0.0 {
            return Err(AgentError::InvalidSettings(
                "quality_weights must not be negative".to_string(),
            ));
        }
        if weights.confidence + weights.required + weights.title <= 0.0 {
            return Err(AgentError::InvalidSettings(
                "quality_weights must not all be zero".to_string(),
            ));
        }
        for (name, density) in &processing.ingredient_densities {
            if !density.is_finite() || *density <= 0.0 {
                return Err(AgentError::InvalidSettings(format!(
                    "density for '{name}' must be a positive number of grams per cup, got {density}"
                )));
            }
        }
        if Duration::try_from_secs_f64(self.scraping.retry_delay).is_err() {
            return Err(AgentError::InvalidSettings(format!(
                "scraping.retry_delay must be a non-negative number of seconds, got {}",
                self.scraping.retry_delay
            )));
        }
        if processing.max_concurrent_runs == 0 || self.llm.max_concurrent_calls == 0 {
            return Err(AgentError::InvalidSettings(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.llm.default_provider, ProviderKind::Anthropic);
        assert_eq!(settings.llm.temperature, 0.7);
        assert_eq!(settings.llm.max_tokens, 1000);
        assert_eq!(settings.scraping.timeout, 10);
        assert_eq!(settings.scraping.max_retries, 3);
        assert_eq!(settings.scraping.max_content_length, 10 * 1024 * 1024);
        assert_eq!(settings.processing.min_ingredient_confidence, 0.7);
        assert_eq!(settings.processing.preferred_volume_unit, Unit::Cup);
        assert_eq!(settings.processing.preferred_weight_unit, Unit::Gram);
        assert_eq!(settings.output.output_dir, PathBuf::from("./output"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_provider_order_deduplicates() {
        let llm = LlmSettings {
            default_provider: ProviderKind::OpenAi,
            ..LlmSettings::default()
        };
        assert_eq!(
            llm.provider_order(),
            vec![ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::Ollama]
        );
    }

    #[test]
    fn test_from_toml_overrides_and_ignores_unknown_keys() {
        let settings = Settings::from_toml_str(
            r#"
            [llm]
            default_provider = "ollama"
            fallback_order = ["ollama", "openai"]
            some_future_option = true

            [llm.ollama]
            model = "mistral"

            [processing]
            preferred_volume_unit = "ml"
            preferred_temperature_unit = "C"

            [processing.ingredient_aliases]
            "all purpose flour" = "flour"
            "#,
        )
        .unwrap();

        assert_eq!(settings.llm.default_provider, ProviderKind::Ollama);
        assert_eq!(settings.llm.ollama.model.as_deref(), Some("mistral"));
        assert_eq!(settings.llm.max_tokens, 1000);
        assert_eq!(settings.processing.preferred_volume_unit, Unit::Milliliter);
        assert_eq!(
            settings.processing.preferred_temperature_unit,
            TemperatureUnit::Celsius
        );
        assert_eq!(
            settings.processing.ingredient_aliases.get("all purpose flour"),
            Some(&"flour".to_string())
        );
        assert_eq!(settings.scraping.user_agent, "RecipeAgent/1.0 (Educational Use)");
    }

    #[test]
    fn test_validate_rejects_wrong_unit_kind() {
        let result = Settings::from_toml_str(
            r#"
            [processing]
            preferred_volume_unit = "g"
            "#,
        );
        assert!(matches!(result, Err(AgentError::InvalidSettings(_))));
    }

    #[test]
    fn test_validate_rejects_unusable_retry_delay() {
        for delay in [-1.0, f64::INFINITY, f64::NAN, 1e300] {
            let mut settings = Settings::default();
            settings.scraping.retry_delay = delay;
            assert!(
                matches!(settings.validate(), Err(AgentError::InvalidSettings(_))),
                "delay {delay} accepted"
            );
            assert_eq!(settings.scraping.retry_delay(), Duration::ZERO);
        }

        let mut settings = Settings::default();
        settings.scraping.retry_delay = 0.25;
        assert!(settings.validate().is_ok());
        assert_eq!(settings.scraping.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_density_settings() {
        let settings = Settings::from_toml_str(
            r#"
            [processing]
            convert_volume_to_weight = true
            preferred_weight_unit = "oz"

            [processing.ingredient_densities]
            tahini = 240.0
            "#,
        )
        .unwrap();
        assert!(settings.processing.convert_volume_to_weight);
        assert_eq!(
            settings.processing.ingredient_densities.get("tahini"),
            Some(&240.0)
        );

        let result = Settings::from_toml_str(
            r#"
            [processing.ingredient_densities]
            tahini = -1.0
            "#,
        );
        assert!(matches!(result, Err(AgentError::InvalidSettings(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut settings = Settings::default();
        settings.processing.min_recipe_quality_score = 1.5;
        assert!(settings.validate().is_err());
    }
}
