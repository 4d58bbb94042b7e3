//! # Itinera Models
//!
//! Centralized LLM configuration types. Every supported provider speaks the
//! OpenAI-compatible chat-completions protocol, so a provider is just a
//! default endpoint, a default model and the environment variable that
//! carries its API key.

use serde::{Deserialize, Serialize};

/// Supported LLM providers
///
/// - DashScope (Qwen, OpenAI-compatible mode) - `DASHSCOPE_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    DashScope,
    #[serde(rename = "openai")]
    OpenAI,
    DeepSeek,
    OpenRouter,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::DashScope,
            LlmProvider::OpenAI,
            LlmProvider::DeepSeek,
            LlmProvider::OpenRouter,
        ]
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "DashScope",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::DeepSeek => "DeepSeek",
            LlmProvider::OpenRouter => "OpenRouter",
        }
    }

    /// Parse a provider id as used in config files and CLI flags
    pub fn from_id(id: &str) -> Option<LlmProvider> {
        match id.to_ascii_lowercase().as_str() {
            "dashscope" | "qwen" => Some(LlmProvider::DashScope),
            "openai" => Some(LlmProvider::OpenAI),
            "deepseek" => Some(LlmProvider::DeepSeek),
            "openrouter" => Some(LlmProvider::OpenRouter),
            _ => None,
        }
    }

    /// Model used when neither a per-agent nor a global model is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "qwen-turbo",
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::DeepSeek => "deepseek-chat",
            LlmProvider::OpenRouter => "qwen/qwen-turbo",
        }
    }

    /// OpenAI-compatible endpoint root (without `/chat/completions`)
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "DASHSCOPE_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Configuration for LLM model selection
///
/// Used by every gateway the orchestrator builds. Supports per-agent
/// overrides through `OrchestratorConfig::model_for`.
///
/// ## Example
/// ```rust,ignore
/// use itinera_core::models::{ModelConfig, LlmProvider};
///
/// // Default DashScope / qwen-turbo
/// let config = ModelConfig::default();
///
/// // Specific provider and model, pointed at a proxy
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o")
///     .with_base_url("http://localhost:8000/v1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "qwen-turbo", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::DashScope, LlmProvider::DashScope.default_model())
    }
}

impl ModelConfig {
    /// Create a new model config with the default provider (DashScope)
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::DashScope, model)
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            temperature: default_temperature(),
        }
    }

    /// Set base URL (for proxies and self-hosted OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Endpoint root actually used: explicit override or the provider default
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::DashScope);
        assert_eq!(config.model, "qwen-turbo");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_provider_display_names() {
        assert_eq!(LlmProvider::DashScope.display_name(), "DashScope");
        assert_eq!(LlmProvider::OpenAI.display_name(), "OpenAI");
    }

    #[test]
    fn test_provider_ids() {
        assert_eq!(LlmProvider::from_id("OpenAI"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_id("qwen"), Some(LlmProvider::DashScope));
        assert_eq!(LlmProvider::from_id("anthropic"), None);
    }

    #[test]
    fn test_base_url_resolution() {
        let config = ModelConfig::default();
        assert_eq!(
            config.resolved_base_url(),
            "https://dashscope.aliyuncs.com/compatible-mode/v1"
        );

        let config = config.with_base_url("http://localhost:9000/v1/");
        assert_eq!(config.resolved_base_url(), "http://localhost:9000/v1");
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));

        let parsed: ModelConfig =
            serde_json::from_str(r#"{"provider":"deepseek","model":"deepseek-chat"}"#).unwrap();
        assert_eq!(parsed.provider, LlmProvider::DeepSeek);
        assert!(parsed.base_url.is_none());
    }
}
