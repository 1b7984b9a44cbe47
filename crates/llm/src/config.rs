use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sprintmind_common::{Result, SprintMindError};
use tracing::info;

use crate::client::LlmClient;
use crate::openai::OpenAiClient;

/// Model provider settings.
///
/// `provider = "none"` (or an empty provider) means no model is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        let provider = self.provider.trim();
        !provider.is_empty() && !provider.eq_ignore_ascii_case("none")
    }
}

/// Build the configured client, or `Ok(None)` when no provider is set.
pub fn build_llm_client(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>> {
    if !config.is_enabled() {
        info!("No LLM provider configured, agents use heuristics only");
        return Ok(None);
    }

    if config.model.trim().is_empty() {
        return Err(SprintMindError::Config(format!(
            "LLM provider '{}' requires a model name",
            config.provider
        )));
    }

    match config.provider.trim().to_lowercase().as_str() {
        "openai" | "openai-compatible" | "ollama" => {
            info!(provider = %config.provider, model = %config.model, "LLM client configured");
            let client = OpenAiClient::new(
                config.api_url.clone(),
                config.model.clone(),
                config.api_key.clone(),
            )
            .with_defaults(config.temperature, config.max_tokens);
            Ok(Some(Arc::new(client)))
        }
        other => Err(SprintMindError::Config(format!(
            "Unknown LLM provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(
            r#"
provider = "openai"
model = "llama3"
api_url = "http://localhost:11434"
temperature = 0.2
"#,
        )
        .unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert!(config.api_key.is_none());
        assert_eq!(config.temperature, Some(0.2));
    }

    #[test]
    fn empty_or_none_provider_builds_nothing() {
        assert!(build_llm_client(&LlmConfig::default()).unwrap().is_none());

        let config = LlmConfig {
            provider: "None".to_string(),
            model: "ignored".to_string(),
            ..Default::default()
        };
        assert!(build_llm_client(&config).unwrap().is_none());
    }

    #[test]
    fn build_openai_client() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = build_llm_client(&config).unwrap().unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn missing_model_fails() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_llm_client(&config),
            Err(SprintMindError::Config(_))
        ));
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            model: "gemini-pro".to_string(),
            ..Default::default()
        };
        assert!(build_llm_client(&config).is_err());
    }
}
