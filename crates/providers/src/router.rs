//! Backend selection from configuration.

use std::sync::Arc;

use tracing::info;

use tracepilot_config::AppConfig;
use tracepilot_core::error::Error;
use tracepilot_core::model::LanguageModel;

use crate::anthropic::AnthropicModel;
use crate::openai_compat::OpenAiCompatModel;

/// Build the configured default language model.
///
/// Recognized providers: `openai`, `openrouter`, `ollama`, `anthropic`, or
/// any other name with a configured `base_url` (treated as
/// OpenAI-compatible). Everything except Ollama requires an API key.
pub fn build_default_model(config: &AppConfig) -> Result<Arc<dyn LanguageModel>, Error> {
    let provider = config.default_provider.as_str();
    let api_key = config.api_key_for(provider);

    let require_key = || {
        api_key.clone().ok_or_else(|| Error::Config {
            message: format!(
                "Provider '{provider}' requires an API key — set TRACEPILOT_API_KEY or [providers.{provider}].api_key"
            ),
        })
    };

    let model: Arc<dyn LanguageModel> = match provider {
        "openai" => Arc::new(OpenAiCompatModel::openai(require_key()?)),
        "openrouter" => Arc::new(OpenAiCompatModel::openrouter(require_key()?)),
        "ollama" => {
            let base_url = config
                .providers
                .get(provider)
                .and_then(|p| p.base_url.as_deref());
            Arc::new(OpenAiCompatModel::ollama(base_url))
        }
        "anthropic" => {
            let mut backend = AnthropicModel::new(require_key()?);
            if let Some(base_url) = config
                .providers
                .get(provider)
                .and_then(|p| p.base_url.clone())
            {
                backend = backend.with_base_url(base_url);
            }
            Arc::new(backend)
        }
        other => {
            let base_url = config
                .providers
                .get(other)
                .and_then(|p| p.base_url.clone())
                .ok_or_else(|| Error::Config {
                    message: format!(
                        "Unknown provider '{other}' — configure [providers.{other}].base_url for an OpenAI-compatible endpoint"
                    ),
                })?;
            Arc::new(OpenAiCompatModel::new(other, base_url, require_key()?))
        }
    };

    info!(provider, model = %config.default_model, "Language model configured");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracepilot_config::ProviderConfig;

    #[test]
    fn openai_requires_key() {
        let config = AppConfig::default();
        assert!(build_default_model(&config).is_err());

        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".into());
        let model = build_default_model(&config).unwrap();
        assert_eq!(model.name(), "openai");
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.default_provider = "ollama".into();
        let model = build_default_model(&config).unwrap();
        assert_eq!(model.name(), "ollama");
    }

    #[test]
    fn anthropic_with_provider_key() {
        let mut config = AppConfig::default();
        config.default_provider = "anthropic".into();
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig {
                api_key: Some("sk-ant".into()),
                ..Default::default()
            },
        );
        let model = build_default_model(&config).unwrap();
        assert_eq!(model.name(), "anthropic");
    }

    #[test]
    fn unknown_provider_needs_base_url() {
        let mut config = AppConfig::default();
        config.default_provider = "vllm".into();
        config.api_key = Some("k".into());
        assert!(build_default_model(&config).is_err());

        config.providers.insert(
            "vllm".into(),
            ProviderConfig {
                base_url: Some("http://localhost:8000/v1".into()),
                ..Default::default()
            },
        );
        let model = build_default_model(&config).unwrap();
        assert_eq!(model.name(), "vllm");
    }
}
