//! # Runs API
//!
//! Submitting a run spawns it in the background and returns its id at once.
//! Progress is stored in the run history and streamed live over SSE.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream, StreamExt};
use itinera_core::state::{RetryRefused, RunEntry, RunStatus, RunSummary};
use itinera_core::swarm::{
    DynamicRun, ExecutionStats, Orchestrator, OrchestratorConfig, Record, RunContext, RunOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::{ApiError, ApiResponse, SharedState};
use crate::config::{parse_fallback, parse_mode, PersistedConfig};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    /// Free-text travel request
    pub query: String,
    /// `static` or `dynamic`; defaults to the configured mode
    #[serde(default)]
    pub mode: Option<String>,
    /// `fail` or `static`; defaults to the configured fallback
    #[serde(default)]
    pub planning_fallback: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRunResponse {
    pub run_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunListResponse {
    #[schema(value_type = Vec<Object>)]
    pub runs: Vec<RunSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunDetailResponse {
    #[schema(value_type = Object)]
    pub run: RunEntry,
    #[schema(value_type = Option<Object>)]
    pub stats: Option<ExecutionStats>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordListResponse {
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<Record>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RetryResponse {
    pub run_id: String,
    pub recovered: usize,
    pub failed_steps: Vec<String>,
}

async fn load_config(state: &SharedState) -> Result<OrchestratorConfig, ApiError> {
    PersistedConfig::load(&state.config_path)
        .await
        .to_orchestrator_config()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

fn build_orchestrator(config: OrchestratorConfig) -> Result<Orchestrator, ApiError> {
    Orchestrator::from_config(config).map_err(|e| ApiError::internal(e.to_string()))
}

/// Start a run
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "runs",
    request_body = CreateRunRequest,
    responses(
        (status = 202, description = "Run started", body = CreateRunResponse),
        (status = 400, description = "Empty query or unknown mode", body = ApiResponse),
        (status = 500, description = "Model gateway could not be configured", body = ApiResponse)
    )
)]
pub async fn create_run(
    State(state): State<SharedState>,
    Json(req): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<CreateRunResponse>), ApiError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let config = load_config(&state).await?;
    let mut options = RunOptions::from(&config);
    if let Some(mode) = &req.mode {
        options.mode = parse_mode(mode).map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    if let Some(fallback) = &req.planning_fallback {
        options.planning_fallback =
            parse_fallback(fallback).map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    let orchestrator = build_orchestrator(config)?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    state.history.start(&run_id, &query, options.mode);
    state
        .cancels
        .write()
        .await
        .insert(run_id.clone(), cancel.clone());

    let ctx = RunContext::new(Arc::new(state.history.recorder(&run_id)))
        .with_run_id(run_id.clone())
        .with_cancel(cancel);

    tracing::info!(run_id = %run_id, mode = %options.mode, "run submitted");
    let task_state = state.clone();
    let task_id = run_id.clone();
    tokio::spawn(async move {
        let outcome = orchestrator.run_with(&query, options, &ctx).await;
        if let Err(e) = &outcome {
            tracing::warn!(run_id = %task_id, error = %e, "run failed");
        }
        task_state.history.finish(&task_id, &outcome);
        task_state.cancels.write().await.remove(&task_id);
    });

    Ok((StatusCode::ACCEPTED, Json(CreateRunResponse { run_id })))
}

/// List runs, newest first
#[utoipa::path(
    get,
    path = "/api/v1/runs",
    tag = "runs",
    responses(
        (status = 200, description = "Recent runs", body = RunListResponse)
    )
)]
pub async fn list_runs(State(state): State<SharedState>) -> Json<RunListResponse> {
    Json(RunListResponse {
        runs: state.history.list(),
    })
}

/// Get one run with its results
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}",
    tag = "runs",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Run details", body = RunDetailResponse),
        (status = 404, description = "Unknown run", body = ApiResponse)
    )
)]
pub async fn get_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RunDetailResponse>, ApiError> {
    let run = state
        .history
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("run {id}")))?;
    let stats = run.dynamic.as_ref().map(DynamicRun::stats);
    Ok(Json(RunDetailResponse { run, stats }))
}

/// Get a run's progress records
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}/records",
    tag = "runs",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Progress records in order", body = RecordListResponse),
        (status = 404, description = "Unknown run", body = ApiResponse)
    )
)]
pub async fn get_records(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RecordListResponse>, ApiError> {
    let records = state
        .history
        .records(&id)
        .ok_or_else(|| ApiError::not_found(format!("run {id}")))?;
    Ok(Json(RecordListResponse { records }))
}

fn record_event(record: &Record) -> Event {
    let json = serde_json::to_string(record).unwrap_or_default();
    Event::default().event("record").id(record.id.clone()).data(json)
}

/// Stream a run's records: everything so far, then live until it finishes
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}/events",
    tag = "runs",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Server-sent `record` events, then one `done` event"),
        (status = 404, description = "Unknown run", body = ApiResponse)
    )
)]
pub async fn run_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe before the snapshot so nothing falls between the two.
    let live = state.history.subscribe(&id);
    let snapshot = state
        .history
        .records(&id)
        .ok_or_else(|| ApiError::not_found(format!("run {id}")))?;
    let seen: HashSet<String> = snapshot.iter().map(|r| r.id.clone()).collect();

    let replay = stream::iter(
        snapshot
            .iter()
            .map(|r| Ok::<_, Infallible>(record_event(r)))
            .collect::<Vec<_>>(),
    );

    let live = match live {
        Some(rx) => BroadcastStream::new(rx)
            .filter_map(move |item| {
                let event = match item {
                    Ok(record) if !seen.contains(&record.id) => {
                        Some(Ok::<_, Infallible>(record_event(&record)))
                    }
                    Ok(_) => None,
                    // Lagged receivers skip what they missed; the records endpoint has it all.
                    Err(_) => None,
                };
                async move { event }
            })
            .boxed(),
        None => stream::empty().boxed(),
    };

    let history = state.history.clone();
    let done = stream::once(async move {
        let status = history
            .get(&id)
            .map(|entry| entry.status)
            .unwrap_or(RunStatus::Failed);
        let data = serde_json::to_string(&status).unwrap_or_default();
        Ok(Event::default().event("done").data(data))
    });

    Ok(Sse::new(replay.chain(live).chain(done)).keep_alive(KeepAlive::default()))
}

/// Cancel a running run
#[utoipa::path(
    post,
    path = "/api/v1/runs/{id}/cancel",
    tag = "runs",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Cancellation requested", body = ApiResponse),
        (status = 404, description = "Unknown run", body = ApiResponse),
        (status = 409, description = "Run already finished", body = ApiResponse)
    )
)]
pub async fn cancel_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    if state.history.get(&id).is_none() {
        return Err(ApiError::not_found(format!("run {id}")));
    }
    let cancels = state.cancels.read().await;
    let token = cancels
        .get(&id)
        .ok_or_else(|| ApiError::conflict(format!("run {id} is not running")))?;
    token.cancel();
    tracing::info!(run_id = %id, "cancellation requested");

    Ok(Json(ApiResponse {
        success: true,
        message: format!("run {id} cancelling"),
    }))
}

/// Re-run the failed steps of a finished dynamic run
///
/// The run is `running` while the retry is in flight: its records stream over
/// SSE, `cancel` stops it and a second retry is refused.
#[utoipa::path(
    post,
    path = "/api/v1/runs/{id}/retry",
    tag = "runs",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Retry finished", body = RetryResponse),
        (status = 404, description = "Unknown run", body = ApiResponse),
        (status = 409, description = "Not a finished dynamic run, or already retrying", body = ApiResponse),
        (status = 500, description = "Retry failed", body = ApiResponse)
    )
)]
pub async fn retry_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RetryResponse>, ApiError> {
    let mut run = state.history.begin_retry(&id).map_err(|refused| match refused {
        RetryRefused::NotFound(_) => ApiError::not_found(format!("run {id}")),
        other => ApiError::conflict(other.to_string()),
    })?;

    let orchestrator = match load_config(&state).await.and_then(build_orchestrator) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            state.history.finish_retry(&id, Err(e.message.clone()));
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    state
        .cancels
        .write()
        .await
        .insert(id.clone(), cancel.clone());
    let ctx = RunContext::new(Arc::new(state.history.recorder(&id)))
        .with_run_id(id.clone())
        .with_cancel(cancel);

    tracing::info!(run_id = %id, "retry started");
    let outcome = orchestrator.retry(&mut run, &ctx).await;
    state.cancels.write().await.remove(&id);

    match outcome {
        Ok(recovered) => {
            let failed_steps = run.failed_steps.clone();
            state.history.finish_retry(&id, Ok(run));
            Ok(Json(RetryResponse {
                run_id: id,
                recovered,
                failed_steps,
            }))
        }
        Err(e) => {
            tracing::warn!(run_id = %id, error = %e, "retry failed");
            state.history.finish_retry(&id, Err(e.to_string()));
            Err(ApiError::internal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AppState;
    use axum::http::StatusCode;
    use itinera_core::swarm::{AgentResults, RunMode, RunReport};

    fn completed_dynamic_run(state: &SharedState, id: &str) {
        state.history.start(id, "去北京", RunMode::Dynamic);
        state.history.finish(
            id,
            &Ok(RunReport {
                mode: RunMode::Dynamic,
                fell_back: false,
                results: AgentResults::default(),
                dynamic: Some(DynamicRun::new("去北京")),
            }),
        );
    }

    fn app_state() -> SharedState {
        Arc::new(AppState::new(
            std::env::temp_dir().join("itinera-runs-test-missing.json"),
        ))
    }

    #[tokio::test]
    async fn test_second_retry_is_rejected_while_first_runs() {
        let state = app_state();
        completed_dynamic_run(&state, "run-1");
        let _in_flight = state.history.begin_retry("run-1").unwrap();

        let err = retry_run(State(state.clone()), Path("run-1".into()))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(state.history.get("run-1").unwrap().status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_retry_of_unknown_or_static_run() {
        let state = app_state();
        let err = retry_run(State(state.clone()), Path("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        state.history.start("s", "去北京", RunMode::Static);
        let err = retry_run(State(state.clone()), Path("s".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
