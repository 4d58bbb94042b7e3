//! Agent discovery and configuration endpoints.

use axum::{extract::State, response::Json};
use itinera_core::models::LlmProvider;
use itinera_core::skills::{AgentKind, AgentSpec};
use itinera_core::swarm::OrchestratorConfig;
use serde::Serialize;
use utoipa::ToSchema;

use super::{ApiError, SharedState};
use crate::config::PersistedConfig;

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentInfo {
    pub name: String,
    pub component: String,
    pub description: String,
    pub input_format: String,
    pub input_example: String,
}

impl From<&AgentSpec> for AgentInfo {
    fn from(spec: &AgentSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            component: spec.kind.component_id().to_string(),
            description: spec.description.to_string(),
            input_format: spec.input_format.to_string(),
            input_example: spec.input_example.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentListResponse {
    pub agents: Vec<AgentInfo>,
}

pub fn agent_infos() -> Vec<AgentInfo> {
    AgentKind::ALL
        .into_iter()
        .map(|kind| AgentInfo::from(&AgentSpec::for_kind(kind)))
        .collect()
}

/// List the expert agents
#[utoipa::path(
    get,
    path = "/api/v1/agents",
    tag = "agents",
    responses(
        (status = 200, description = "Expert agents with their input contracts", body = AgentListResponse)
    )
)]
pub async fn list_agents() -> Json<AgentListResponse> {
    Json(AgentListResponse {
        agents: agent_infos(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PersistedConfig,
    /// Defaults every missing field falls back to
    #[schema(value_type = Object)]
    pub defaults: OrchestratorConfig,
}

/// Get configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Persisted overrides and defaults", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        config: PersistedConfig::load(&state.config_path).await,
        defaults: OrchestratorConfig::default(),
    })
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Unknown mode, provider or component", body = super::ApiResponse)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(updates): Json<PersistedConfig>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let mut config = PersistedConfig::load(&state.config_path).await;
    config.merge(updates);
    config
        .to_orchestrator_config()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    config
        .save(&state.config_path)
        .await
        .map_err(|e| ApiError::internal(format!("failed to save config: {e}")))?;
    tracing::info!(path = %state.config_path.display(), "configuration updated");

    Ok(Json(ConfigResponse {
        config,
        defaults: OrchestratorConfig::default(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub default_model: String,
    pub api_key_env: String,
    pub configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

fn provider_id(provider: &LlmProvider) -> String {
    serde_json::to_value(provider)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| provider.display_name().to_ascii_lowercase())
}

/// Get available LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "Supported LLM providers", body = ProvidersResponse)
    )
)]
pub async fn get_providers() -> Json<ProvidersResponse> {
    let providers = LlmProvider::all()
        .iter()
        .map(|provider| ProviderInfo {
            id: provider_id(provider),
            name: provider.display_name().to_string(),
            default_model: provider.default_model().to_string(),
            api_key_env: provider.api_key_env().to_string(),
            configured: std::env::var(provider.api_key_env()).is_ok_and(|v| !v.trim().is_empty()),
        })
        .collect();
    Json(ProvidersResponse { providers })
}
