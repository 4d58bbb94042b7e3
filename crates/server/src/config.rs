//! Persisted configuration overrides.
//!
//! `.itinera/config.json` holds a partial `OrchestratorConfig`: every field
//! is optional and merged field by field onto the defaults. API keys never
//! live here; they come from the environment (or `.env`).

use anyhow::{bail, Result};
use itinera_core::models::LlmProvider;
use itinera_core::swarm::{OrchestratorConfig, PlanningFallback, RunMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

pub const CONFIG_PATH: &str = ".itinera/config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    /// `static` or `dynamic`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// `fail` or `static`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_rounds: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qweather_geo_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qweather_api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_providers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_models: HashMap<String, String>,
}

impl PersistedConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_PATH)
    }

    /// Missing or unreadable files yield the empty override
    pub async fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read config file");
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(path, content).await
    }

    pub fn merge(&mut self, other: PersistedConfig) {
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.planning_fallback.is_some() {
            self.planning_fallback = other.planning_fallback;
        }
        if other.global_provider.is_some() {
            self.global_provider = other.global_provider;
        }
        if other.global_model.is_some() {
            self.global_model = other.global_model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.max_tool_rounds.is_some() {
            self.max_tool_rounds = other.max_tool_rounds;
        }
        if other.call_timeout_secs.is_some() {
            self.call_timeout_secs = other.call_timeout_secs;
        }
        if other.run_timeout_secs.is_some() {
            self.run_timeout_secs = other.run_timeout_secs;
        }
        if other.qweather_geo_base_url.is_some() {
            self.qweather_geo_base_url = other.qweather_geo_base_url;
        }
        if other.qweather_api_base_url.is_some() {
            self.qweather_api_base_url = other.qweather_api_base_url;
        }
        for (k, v) in other.per_agent_providers {
            self.per_agent_providers.insert(k, v);
        }
        for (k, v) in other.per_agent_models {
            self.per_agent_models.insert(k, v);
        }
    }

    /// Overlay onto the defaults, rejecting unknown ids and unusable limits
    pub fn to_orchestrator_config(&self) -> Result<OrchestratorConfig> {
        let mut config = OrchestratorConfig::default();

        if let Some(mode) = &self.mode {
            config.mode = parse_mode(mode)?;
        }
        if let Some(fallback) = &self.planning_fallback {
            config.planning_fallback = parse_fallback(fallback)?;
        }
        if let Some(provider) = &self.global_provider {
            config.global_provider = parse_provider(provider)?;
        }
        if self.global_model.is_some() {
            config.global_model = self.global_model.clone();
        }
        if self.base_url.is_some() {
            config.base_url = self.base_url.clone();
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                bail!("temperature {temperature} is out of range (expected 0.0 to 2.0)");
            }
            config.temperature = temperature;
        }
        if let Some(rounds) = self.max_tool_rounds {
            if rounds == 0 {
                bail!("max_tool_rounds must be at least 1");
            }
            config.max_tool_rounds = rounds;
        }
        if let Some(secs) = self.call_timeout_secs {
            if secs == 0 {
                bail!("call_timeout_secs must be at least 1");
            }
            config.call_timeout_secs = secs;
        }
        if let Some(secs) = self.run_timeout_secs {
            if secs == 0 {
                bail!("run_timeout_secs must be at least 1");
            }
            config.run_timeout_secs = secs;
        }
        if let Some(url) = &self.qweather_geo_base_url {
            config.qweather.geo_base_url = url.clone();
        }
        if let Some(url) = &self.qweather_api_base_url {
            config.qweather.api_base_url = url.clone();
        }

        for (component, provider) in &self.per_agent_providers {
            check_component(component)?;
            config
                .per_agent_providers
                .insert(component.clone(), parse_provider(provider)?);
        }
        for (component, model) in &self.per_agent_models {
            check_component(component)?;
            config.per_agent_models.insert(component.clone(), model.clone());
        }
        Ok(config)
    }
}

pub fn parse_mode(id: &str) -> Result<RunMode> {
    match RunMode::from_id(id) {
        Some(mode) => Ok(mode),
        None => bail!("unknown mode '{id}' (expected static or dynamic)"),
    }
}

pub fn parse_fallback(id: &str) -> Result<PlanningFallback> {
    match PlanningFallback::from_id(id) {
        Some(fallback) => Ok(fallback),
        None => bail!("unknown planning fallback '{id}' (expected fail or static)"),
    }
}

fn parse_provider(id: &str) -> Result<LlmProvider> {
    match LlmProvider::from_id(id) {
        Some(provider) => Ok(provider),
        None => bail!("unknown provider '{id}'"),
    }
}

fn check_component(component: &str) -> Result<()> {
    if !OrchestratorConfig::COMPONENTS.contains(&component) {
        bail!(
            "unknown component '{component}' (expected one of {})",
            OrchestratorConfig::COMPONENTS.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_field_by_field() {
        let mut config = PersistedConfig {
            mode: Some("dynamic".into()),
            global_model: Some("qwen-plus".into()),
            ..Default::default()
        };
        config.per_agent_models.insert("planner".into(), "qwen-max".into());

        let mut update = PersistedConfig {
            global_model: Some("qwen-turbo".into()),
            ..Default::default()
        };
        update.per_agent_models.insert("weather".into(), "qwen-plus".into());
        config.merge(update);

        assert_eq!(config.mode.as_deref(), Some("dynamic"));
        assert_eq!(config.global_model.as_deref(), Some("qwen-turbo"));
        assert_eq!(config.per_agent_models.len(), 2);
    }

    #[test]
    fn test_overlay_onto_defaults() {
        let mut persisted = PersistedConfig {
            mode: Some("dynamic".into()),
            planning_fallback: Some("static".into()),
            global_provider: Some("deepseek".into()),
            run_timeout_secs: Some(120),
            ..Default::default()
        };
        persisted
            .per_agent_providers
            .insert("supervisor".into(), "openai".into());

        let config = persisted.to_orchestrator_config().unwrap();
        assert_eq!(config.mode, RunMode::Dynamic);
        assert_eq!(config.planning_fallback, PlanningFallback::Static);
        assert_eq!(config.global_provider, LlmProvider::DeepSeek);
        assert_eq!(config.run_timeout_secs, 120);
        assert_eq!(config.call_timeout_secs, 60);
        assert_eq!(config.model_for("supervisor").provider, LlmProvider::OpenAI);
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        let bad_mode = PersistedConfig {
            mode: Some("auto".into()),
            ..Default::default()
        };
        assert!(bad_mode.to_orchestrator_config().is_err());

        let mut bad_component = PersistedConfig::default();
        bad_component
            .per_agent_models
            .insert("hotel".into(), "qwen-max".into());
        let err = bad_component.to_orchestrator_config().unwrap_err();
        assert!(err.to_string().contains("hotel"));
    }

    #[test]
    fn test_unusable_limits_are_rejected() {
        let cases = [
            PersistedConfig {
                run_timeout_secs: Some(0),
                ..Default::default()
            },
            PersistedConfig {
                call_timeout_secs: Some(0),
                ..Default::default()
            },
            PersistedConfig {
                max_tool_rounds: Some(0),
                ..Default::default()
            },
            PersistedConfig {
                temperature: Some(2.5),
                ..Default::default()
            },
            PersistedConfig {
                temperature: Some(-0.1),
                ..Default::default()
            },
            PersistedConfig {
                temperature: Some(f32::NAN),
                ..Default::default()
            },
        ];
        for case in cases {
            assert!(case.to_orchestrator_config().is_err(), "accepted {case:?}");
        }

        let edges = PersistedConfig {
            temperature: Some(0.0),
            max_tool_rounds: Some(1),
            call_timeout_secs: Some(1),
            run_timeout_secs: Some(1),
            ..Default::default()
        };
        let config = edges.to_orchestrator_config().unwrap();
        assert_eq!(config.max_tool_rounds, 1);
        assert_eq!(config.run_timeout_secs, 1);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("itinera-config-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = PersistedConfig {
            global_model: Some("qwen-max".into()),
            ..Default::default()
        };

        config.save(&path).await.unwrap();
        assert_eq!(PersistedConfig::load(&path).await, config);

        let _ = tokio::fs::remove_dir_all(&dir).await;
        assert_eq!(PersistedConfig::load(&path).await, PersistedConfig::default());
    }
}
