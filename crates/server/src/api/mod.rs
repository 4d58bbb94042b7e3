//! # HTTP API
//!
//! Routes under `/api/v1`: run submission and inspection, live progress over
//! SSE, agent discovery and configuration.

pub mod config;
pub mod runs;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use itinera_core::state::RunHistory;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    pub history: RunHistory,
    /// Cancellation tokens of runs still in flight
    pub cancels: RwLock<HashMap<String, CancellationToken>>,
    pub config_path: PathBuf,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            history: RunHistory::default(),
            cancels: RwLock::new(HashMap::new()),
            config_path,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Error body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{what} not found"),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse {
            success: false,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Itinera API",
        version = "1.0.0",
        description = "Multi-agent travel itinerary planning"
    ),
    paths(
        runs::create_run,
        runs::list_runs,
        runs::get_run,
        runs::get_records,
        runs::run_events,
        runs::cancel_run,
        runs::retry_run,
        config::list_agents,
        config::get_config,
        config::update_config,
        config::get_providers
    ),
    components(
        schemas(
            ApiResponse,
            runs::CreateRunRequest,
            runs::CreateRunResponse,
            runs::RunListResponse,
            runs::RunDetailResponse,
            runs::RecordListResponse,
            runs::RetryResponse,
            config::AgentInfo,
            config::AgentListResponse,
            config::ConfigResponse,
            config::ProviderInfo,
            config::ProvidersResponse,
            crate::config::PersistedConfig
        )
    ),
    tags(
        (name = "runs", description = "Itinerary runs and their progress"),
        (name = "agents", description = "Expert agent discovery"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn router(state: SharedState) -> Router {
    let run_routes = Router::new()
        .route("/", get(runs::list_runs).post(runs::create_run))
        .route("/:id", get(runs::get_run))
        .route("/:id/records", get(runs::get_records))
        .route("/:id/events", get(runs::run_events))
        .route("/:id/cancel", post(runs::cancel_run))
        .route("/:id/retry", post(runs::retry_run));

    let api = Router::new()
        .nest("/runs", run_routes)
        .route("/agents", get(config::list_agents))
        .route("/config", get(config::get_config).patch(config::update_config))
        .route("/providers", get(config::get_providers))
        .route("/openapi.json", get(openapi_json));

    Router::new().nest("/api/v1", api).with_state(state)
}
