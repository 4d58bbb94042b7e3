//! # Orchestrator Configuration
//!
//! Mode selection, fallback policy, per-component model overrides and the
//! limits applied to every model call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::gateway::{GatewayError, GatewayLimits, ModelGateway};
use crate::models::{LlmProvider, ModelConfig};
use crate::tools::QWeatherConfig;

/// Which coordination strategy runs a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fixed Analyze → Weather → Plan pipeline
    #[default]
    Static,
    /// Planner + gatekeeper + executor
    Dynamic,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Static => "static",
            RunMode::Dynamic => "dynamic",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_ascii_lowercase().as_str() {
            "static" => Some(RunMode::Static),
            "dynamic" => Some(RunMode::Dynamic),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dynamic run does when planning fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanningFallback {
    /// Surface the planning error
    #[default]
    Fail,
    /// Re-run the query through the static pipeline
    Static,
}

impl PlanningFallback {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_ascii_lowercase().as_str() {
            "fail" => Some(PlanningFallback::Fail),
            "static" => Some(PlanningFallback::Static),
            _ => None,
        }
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub mode: RunMode,
    pub planning_fallback: PlanningFallback,
    /// Global LLM provider (default: DashScope)
    pub global_provider: LlmProvider,
    /// Global model to use for all components
    pub global_model: Option<String>,
    /// Base URL override for the OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// Per-component model overrides (component id -> model name)
    pub per_agent_models: HashMap<String, String>,
    /// Per-component provider overrides (component id -> provider)
    pub per_agent_providers: HashMap<String, LlmProvider>,
    pub temperature: f32,
    /// Tool rounds allowed per conversation
    pub max_tool_rounds: usize,
    /// Deadline for a single model round-trip
    pub call_timeout_secs: u64,
    /// Deadline for a whole run
    pub run_timeout_secs: u64,
    pub qweather: QWeatherConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Static,
            planning_fallback: PlanningFallback::Fail,
            global_provider: LlmProvider::DashScope,
            global_model: None,
            base_url: None,
            per_agent_models: HashMap::new(),
            per_agent_providers: HashMap::new(),
            temperature: 0.7,
            max_tool_rounds: 4,
            call_timeout_secs: 60,
            run_timeout_secs: 300,
            qweather: QWeatherConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Component ids accepted in the per-agent maps
    pub const COMPONENTS: [&'static str; 5] =
        ["analyzer", "weather", "planner", "supervisor", "gatekeeper"];

    /// Model config for one component
    ///
    /// Provider: per-component override, then global. Model: per-component
    /// override, then global, then the provider's default.
    pub fn model_for(&self, component: &str) -> ModelConfig {
        let provider = self
            .per_agent_providers
            .get(component)
            .cloned()
            .unwrap_or_else(|| self.global_provider.clone());

        let model = self
            .per_agent_models
            .get(component)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let mut config = ModelConfig::with_provider(provider, model).with_temperature(self.temperature);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        config
    }

    pub fn limits(&self) -> GatewayLimits {
        GatewayLimits {
            max_tool_rounds: self.max_tool_rounds,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// HTTP gateway for one component, API key from the environment
    pub fn gateway_for(&self, component: &str) -> Result<ModelGateway, GatewayError> {
        let model = self.model_for(component);
        tracing::debug!(
            component,
            provider = model.provider.display_name(),
            model = %model.model,
            "building gateway"
        );
        ModelGateway::from_config(&model, self.limits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.mode, RunMode::Static);
        assert_eq!(config.planning_fallback, PlanningFallback::Fail);
        assert_eq!(config.limits().max_tool_rounds, 4);
        assert_eq!(config.run_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_model_resolution_order() {
        let mut config = OrchestratorConfig {
            global_model: Some("qwen-plus".into()),
            ..OrchestratorConfig::default()
        };
        config
            .per_agent_models
            .insert("planner".into(), "qwen-max".into());
        config
            .per_agent_providers
            .insert("gatekeeper".into(), LlmProvider::DeepSeek);

        assert_eq!(config.model_for("planner").model, "qwen-max");
        assert_eq!(config.model_for("analyzer").model, "qwen-plus");

        let gatekeeper = config.model_for("gatekeeper");
        assert_eq!(gatekeeper.provider, LlmProvider::DeepSeek);
        assert_eq!(gatekeeper.model, "qwen-plus");

        config.global_model = None;
        assert_eq!(config.model_for("gatekeeper").model, "deepseek-chat");
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"mode":"dynamic","planning_fallback":"static"}"#).unwrap();
        assert_eq!(config.mode, RunMode::Dynamic);
        assert_eq!(config.planning_fallback, PlanningFallback::Static);
        assert_eq!(config.call_timeout_secs, 60);
    }

    #[test]
    fn test_mode_ids() {
        assert_eq!(RunMode::from_id("Dynamic"), Some(RunMode::Dynamic));
        assert_eq!(RunMode::from_id("auto"), None);
        assert_eq!(PlanningFallback::from_id("static"), Some(PlanningFallback::Static));
        assert_eq!(RunMode::Dynamic.to_string(), "dynamic");
    }
}
