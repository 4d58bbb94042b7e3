//! # Orchestrator
//!
//! Entry point for one run: picks the static or the dynamic path, applies
//! the run deadline and the planning fallback policy.

use serde::{Deserialize, Serialize};

use crate::gateway::ModelGateway;
use crate::skills::{create_expert_team, AgentRegistry, AgentSpec};

use super::coordinator::StaticCoordinator;
use super::events::Record;
use super::executor::{DynamicExecutor, DynamicRun};
use super::gatekeeper::{GateKeeper, GATEKEEPER_NAME};
use super::supervisor::{Supervisor, SUPERVISOR_NAME};
use super::{AgentResults, OrchestrationError, OrchestratorConfig, PlanningFallback, RunContext, RunMode};

/// Per-run overrides of the configured mode and fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub mode: RunMode,
    pub planning_fallback: PlanningFallback,
}

impl From<&OrchestratorConfig> for RunOptions {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            mode: config.mode,
            planning_fallback: config.planning_fallback,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Path that produced `results`
    pub mode: RunMode,
    /// Dynamic planning failed and the static pipeline ran instead
    pub fell_back: bool,
    pub results: AgentResults,
    /// Plan, pool and step states of a dynamic run
    pub dynamic: Option<DynamicRun>,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: AgentRegistry,
    coordinator: StaticCoordinator,
    executor: DynamicExecutor,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: AgentRegistry,
        supervisor_gateway: ModelGateway,
        gatekeeper_gateway: ModelGateway,
    ) -> Self {
        let specs: Vec<&AgentSpec> = registry.specs();
        let supervisor = Supervisor::new(supervisor_gateway, &specs);
        let gatekeeper = GateKeeper::new(gatekeeper_gateway);

        Self {
            coordinator: StaticCoordinator::new(registry.clone()),
            executor: DynamicExecutor::new(registry.clone(), supervisor, gatekeeper),
            registry,
            config,
        }
    }

    /// Production orchestrator with HTTP gateways for every component
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, OrchestrationError> {
        let registry = create_expert_team(&config)?;
        let supervisor_gateway = config
            .gateway_for("supervisor")
            .map_err(|e| OrchestrationError::gateway(SUPERVISOR_NAME, e))?;
        let gatekeeper_gateway = config
            .gateway_for("gatekeeper")
            .map_err(|e| OrchestrationError::gateway(GATEKEEPER_NAME, e))?;

        Ok(Self::new(config, registry, supervisor_gateway, gatekeeper_gateway))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run with the configured mode and fallback
    pub async fn run(&self, query: &str, ctx: &RunContext) -> Result<RunReport, OrchestrationError> {
        self.run_with(query, RunOptions::from(&self.config), ctx).await
    }

    /// Run under the run deadline; on expiry the run's token is cancelled
    pub async fn run_with(
        &self,
        query: &str,
        options: RunOptions,
        ctx: &RunContext,
    ) -> Result<RunReport, OrchestrationError> {
        tracing::info!(run_id = %ctx.run_id(), mode = %options.mode, "run started");
        let deadline = self.config.run_timeout();

        match tokio::time::timeout(deadline, self.dispatch(query, options, ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                ctx.cancel_token().cancel();
                tracing::warn!(run_id = %ctx.run_id(), ?deadline, "run timed out");
                ctx.record(Record::supervisor(SUPERVISOR_NAME, "运行超时"));
                Err(OrchestrationError::RunTimeout(deadline))
            }
        }
    }

    async fn dispatch(
        &self,
        query: &str,
        options: RunOptions,
        ctx: &RunContext,
    ) -> Result<RunReport, OrchestrationError> {
        match options.mode {
            RunMode::Static => self.run_static(query, ctx, false).await,
            RunMode::Dynamic => match self.executor.execute(query, ctx).await {
                Ok(run) => Ok(RunReport {
                    mode: RunMode::Dynamic,
                    fell_back: false,
                    results: run.results.clone(),
                    dynamic: Some(run),
                }),
                Err(OrchestrationError::Planning(reason))
                    if options.planning_fallback == PlanningFallback::Static =>
                {
                    tracing::warn!(%reason, "planning failed, falling back to static pipeline");
                    ctx.record(
                        Record::supervisor(SUPERVISOR_NAME, "任务规划失败, 改用固定流程").with_text(reason),
                    );
                    self.run_static(query, ctx, true).await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn run_static(
        &self,
        query: &str,
        ctx: &RunContext,
        fell_back: bool,
    ) -> Result<RunReport, OrchestrationError> {
        let results = self.coordinator.run(query, ctx).await?;
        Ok(RunReport {
            mode: RunMode::Static,
            fell_back,
            results,
            dynamic: None,
        })
    }

    /// Re-run the failed steps of a finished dynamic run
    pub async fn retry(&self, run: &mut DynamicRun, ctx: &RunContext) -> Result<usize, OrchestrationError> {
        let deadline = self.config.run_timeout();
        match tokio::time::timeout(deadline, self.executor.retry_failed_steps(run, ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                ctx.cancel_token().cancel();
                Err(OrchestrationError::RunTimeout(deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedBackend;
    use crate::skills::AgentKind;
    use crate::swarm::testing::{default_team, CallLog};
    use crate::swarm::MemoryRecorder;
    use std::sync::Arc;
    use std::time::Duration;

    fn gateway(backend: ScriptedBackend) -> ModelGateway {
        ModelGateway::new(Arc::new(backend))
    }

    fn orchestrator(config: OrchestratorConfig, log: &CallLog, supervisor: ScriptedBackend) -> Orchestrator {
        let gatekeeper = ScriptedBackend::new()
            .text(r#"{"targetAgentInput": "旅行地点: 北京;旅行日期: 2025-07-01"}"#)
            .text(r#"{"targetAgentInput": "天气"}"#);
        Orchestrator::new(config, default_team(log), gateway(supervisor), gateway(gatekeeper))
    }

    #[tokio::test]
    async fn test_static_is_default() {
        let log = CallLog::default();
        let orchestrator = orchestrator(OrchestratorConfig::default(), &log, ScriptedBackend::new());

        let report = orchestrator.run("去北京", &RunContext::detached()).await.unwrap();

        assert_eq!(report.mode, RunMode::Static);
        assert!(!report.fell_back);
        assert!(report.dynamic.is_none());
        assert_eq!(report.results.filled(), AgentKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_dynamic_mode() {
        let log = CallLog::default();
        let supervisor = ScriptedBackend::new()
            .text(r#"[{"agentName": "WeatherAgent"}, {"agentName": "PlannerAgent"}]"#);
        let orchestrator = orchestrator(OrchestratorConfig::default(), &log, supervisor);
        let options = RunOptions {
            mode: RunMode::Dynamic,
            planning_fallback: PlanningFallback::Fail,
        };

        let report = orchestrator
            .run_with("北京 2025-07-01", options, &RunContext::detached())
            .await
            .unwrap();

        assert_eq!(report.mode, RunMode::Dynamic);
        let run = report.dynamic.unwrap();
        assert_eq!(run.pool.len(), 3);
        assert_eq!(report.results, run.results);
        assert!(report.results.analysis.is_empty());
    }

    #[tokio::test]
    async fn test_planning_failure_without_fallback() {
        let log = CallLog::default();
        let config = OrchestratorConfig {
            mode: RunMode::Dynamic,
            ..OrchestratorConfig::default()
        };
        let orchestrator = orchestrator(config, &log, ScriptedBackend::new().text("无法规划"));

        let err = tokio_test::assert_err!(orchestrator.run("去北京", &RunContext::detached()).await);

        assert!(matches!(err, OrchestrationError::Planning(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_planning_failure_falls_back_to_static() {
        let log = CallLog::default();
        let config = OrchestratorConfig {
            mode: RunMode::Dynamic,
            planning_fallback: PlanningFallback::Static,
            ..OrchestratorConfig::default()
        };
        let orchestrator = orchestrator(config, &log, ScriptedBackend::new().text("无法规划"));
        let recorder = Arc::new(MemoryRecorder::new());

        let report = orchestrator
            .run("去北京", &RunContext::new(recorder.clone()))
            .await
            .unwrap();

        assert_eq!(report.mode, RunMode::Static);
        assert!(report.fell_back);
        assert_eq!(report.results.filled(), AgentKind::ALL.to_vec());
        assert!(recorder
            .records()
            .iter()
            .any(|r| r.description == "任务规划失败, 改用固定流程"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline() {
        let log = CallLog::default();
        let config = OrchestratorConfig {
            mode: RunMode::Dynamic,
            run_timeout_secs: 5,
            ..OrchestratorConfig::default()
        };
        let orchestrator = orchestrator(config, &log, ScriptedBackend::new().stall());
        let ctx = RunContext::detached();

        let err = orchestrator.run("去北京", &ctx).await.unwrap_err();

        assert!(matches!(err, OrchestrationError::RunTimeout(d) if d == Duration::from_secs(5)));
        assert!(ctx.cancel_token().is_cancelled());
    }
}
