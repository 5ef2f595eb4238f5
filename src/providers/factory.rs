use crate::config::LlmSettings;
use crate::providers::{
    AnthropicProvider, LlmProvider, OllamaProvider, OpenAIProvider, ProviderKind,
};
use log::{info, warn};

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider instance from configuration
    pub fn create(
        kind: ProviderKind,
        settings: &LlmSettings,
    ) -> Result<Box<dyn LlmProvider>, String> {
        let config = settings.provider(kind);
        match kind {
            ProviderKind::OpenAi => Ok(Box::new(OpenAIProvider::new(config)?)),
            ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(config)?)),
            ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(config))),
        }
    }

    /// Build every provider in gateway order, skipping those that cannot be
    /// initialized (usually a missing API key).
    pub fn create_ordered(settings: &LlmSettings) -> Vec<Box<dyn LlmProvider>> {
        let mut providers = Vec::new();
        for kind in settings.provider_order() {
            match Self::create(kind, settings) {
                Ok(provider) => {
                    info!("Added '{}' to provider chain", kind);
                    providers.push(provider);
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", kind, e);
                }
            }
        }
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;

    fn settings_with_keys() -> LlmSettings {
        LlmSettings {
            anthropic: ProviderSettings {
                api_key: Some("test-key".to_string()),
                ..ProviderSettings::default()
            },
            openai: ProviderSettings {
                api_key: Some("test-key".to_string()),
                ..ProviderSettings::default()
            },
            ..LlmSettings::default()
        }
    }

    #[test]
    fn test_create_openai_provider() {
        let provider = ProviderFactory::create(ProviderKind::OpenAi, &settings_with_keys()).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_create_anthropic_provider() {
        let provider =
            ProviderFactory::create(ProviderKind::Anthropic, &settings_with_keys()).unwrap();
        assert_eq!(provider.provider_name(), "anthropic");
    }

    #[test]
    fn test_create_ollama_needs_no_key() {
        let provider =
            ProviderFactory::create(ProviderKind::Ollama, &LlmSettings::default()).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ordered_follows_settings() {
        let settings = LlmSettings {
            default_provider: ProviderKind::Ollama,
            ..settings_with_keys()
        };
        let names: Vec<String> = ProviderFactory::create_ordered(&settings)
            .iter()
            .map(|p| p.provider_name().to_string())
            .collect();
        assert_eq!(names, vec!["ollama", "anthropic", "openai"]);
    }
}
