//! # Dynamic Executor
//!
//! Plan-then-execute path:
//!
//! ```text
//! Idle → Planning → Executing(0) → … → Executing(n-1) → Completed
//!           │              │
//!           └──────────────┴──▶ Failed (run-fatal errors only)
//! ```
//!
//! Steps run strictly in plan order. For each step the GateKeeper adapts the
//! pool into the agent's input, the agent produces and renders its result,
//! and one entry is appended to the pool. A step that fails is recorded and
//! skipped; the run continues with whatever the remaining steps produce.

use serde::{Deserialize, Serialize};

use crate::skills::AgentRegistry;

use super::events::Record;
use super::gatekeeper::GateKeeper;
use super::plan::{StepOutput, StepStatus, TaskPlan};
use super::pool::OutputPool;
use super::supervisor::Supervisor;
use super::{AgentResults, OrchestrationError, RunContext};

/// Record producer name
pub const EXECUTOR_NAME: &str = "DynamicExecutor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum ExecutorState {
    Idle,
    Planning,
    Executing(usize),
    Completed,
    Failed,
}

/// Everything one dynamic run owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRun {
    pub plan: TaskPlan,
    pub pool: OutputPool,
    pub results: AgentResults,
    pub state: ExecutorState,
    /// Ids of steps whose last attempt failed
    pub failed_steps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub success_rate: f64,
}

impl DynamicRun {
    /// An idle run for `query` with an empty plan
    pub fn new(query: &str) -> Self {
        Self {
            plan: TaskPlan::new(query, Vec::new()),
            pool: OutputPool::seeded(query),
            results: AgentResults::default(),
            state: ExecutorState::Idle,
            failed_steps: Vec::new(),
        }
    }

    pub fn stats(&self) -> ExecutionStats {
        let total = self.plan.steps.len();
        let completed = self
            .plan
            .steps
            .iter()
            .filter(|s| s.status() == StepStatus::Done)
            .count();
        let failed = self
            .plan
            .steps
            .iter()
            .filter(|s| s.status() == StepStatus::Failed)
            .count();
        let success_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        ExecutionStats {
            total,
            completed,
            failed,
            success_rate,
        }
    }
}

/// Runs supervisor plans step by step
#[derive(Clone)]
pub struct DynamicExecutor {
    registry: AgentRegistry,
    supervisor: Supervisor,
    gatekeeper: GateKeeper,
}

impl DynamicExecutor {
    pub fn new(registry: AgentRegistry, supervisor: Supervisor, gatekeeper: GateKeeper) -> Self {
        Self {
            registry,
            supervisor,
            gatekeeper,
        }
    }

    /// Plan and execute a query
    ///
    /// Planning failures and cancellation end the run with an error; every
    /// other step failure is stored on its step.
    #[tracing::instrument(skip(self, query, ctx), fields(run_id = %ctx.run_id()))]
    pub async fn execute(&self, query: &str, ctx: &RunContext) -> Result<DynamicRun, OrchestrationError> {
        let mut run = DynamicRun::new(query);
        self.plan_run(&mut run, ctx).await?;
        self.run_plan(&mut run, ctx).await?;
        Ok(run)
    }

    /// `Idle → Planning`: ask the supervisor for a plan
    ///
    /// On failure the run is left `Failed` with its empty plan.
    pub async fn plan_run(&self, run: &mut DynamicRun, ctx: &RunContext) -> Result<(), OrchestrationError> {
        if run.state != ExecutorState::Idle {
            return Err(OrchestrationError::InvalidState(format!(
                "cannot plan a run in state {:?}",
                run.state
            )));
        }
        run.state = ExecutorState::Planning;
        tracing::debug!(state = ?run.state, "dynamic run started");

        match self.supervisor.plan(&run.plan.query, ctx).await {
            Ok(plan) => {
                run.plan = plan;
                Ok(())
            }
            Err(e) => {
                run.state = ExecutorState::Failed;
                Err(e)
            }
        }
    }

    /// `Planning → Executing(0..n) → Completed`: run every planned step
    pub async fn run_plan(&self, run: &mut DynamicRun, ctx: &RunContext) -> Result<(), OrchestrationError> {
        if run.state != ExecutorState::Planning {
            return Err(OrchestrationError::InvalidState(format!(
                "cannot execute a run in state {:?}",
                run.state
            )));
        }
        let indices: Vec<usize> = (0..run.plan.steps.len()).collect();
        self.run_steps(run, &indices, ctx).await?;

        run.results = Self::assemble(&run.plan);
        run.state = ExecutorState::Completed;

        let stats = run.stats();
        tracing::info!(
            completed = stats.completed,
            failed = stats.failed,
            "dynamic run finished"
        );
        ctx.record(
            Record::supervisor(EXECUTOR_NAME, "任务执行完成")
                .with_json(serde_json::to_string(&stats).unwrap_or_default()),
        );
        Ok(())
    }

    /// Re-run only the steps whose last attempt failed
    ///
    /// Completed steps are never re-run. Returns how many failed steps now
    /// succeed.
    pub async fn retry_failed_steps(
        &self,
        run: &mut DynamicRun,
        ctx: &RunContext,
    ) -> Result<usize, OrchestrationError> {
        if run.state != ExecutorState::Completed {
            return Err(OrchestrationError::InvalidState(format!(
                "cannot retry a run in state {:?}",
                run.state
            )));
        }

        let indices: Vec<usize> = run
            .plan
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status() == StepStatus::Failed)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Ok(0);
        }

        let before = run.failed_steps.len();
        ctx.record(
            Record::supervisor(EXECUTOR_NAME, format!("重试 {} 个失败步骤...", indices.len()))
                .with_text(run.failed_steps.join(",")),
        );

        self.run_steps(run, &indices, ctx).await?;
        run.results = Self::assemble(&run.plan);
        run.state = ExecutorState::Completed;

        let recovered = before.saturating_sub(run.failed_steps.len());
        tracing::info!(recovered, remaining = run.failed_steps.len(), "retry finished");
        ctx.record(Record::supervisor(
            EXECUTOR_NAME,
            format!("重试完成, {recovered} 个步骤成功"),
        ));
        Ok(recovered)
    }

    /// Fold completed steps into the fixed result shape; the last completed
    /// step of an agent wins
    pub fn assemble(plan: &TaskPlan) -> AgentResults {
        let mut results = AgentResults::default();
        for step in plan.steps.iter().rev() {
            if let Some(output) = step.outputs.as_ref().filter(|_| step.done) {
                results.fill(step.agent, output.text.clone(), output.json.clone());
            }
        }
        results
    }

    async fn run_steps(
        &self,
        run: &mut DynamicRun,
        indices: &[usize],
        ctx: &RunContext,
    ) -> Result<(), OrchestrationError> {
        for &index in indices {
            if let Err(e) = ctx.check_cancelled() {
                run.state = ExecutorState::Failed;
                return Err(e);
            }
            run.state = ExecutorState::Executing(index);

            let (id, agent) = {
                let step = &mut run.plan.steps[index];
                step.attempts += 1;
                (step.id.clone(), step.agent)
            };
            ctx.record(Record::supervisor(
                EXECUTOR_NAME,
                format!("执行步骤 {}: {}...", index + 1, agent.name()),
            ));

            match self.run_step(run, index, ctx).await {
                Ok(()) => {
                    run.failed_steps.retain(|failed| failed != &id);
                    ctx.record(Record::supervisor(
                        EXECUTOR_NAME,
                        format!("步骤 {}: {} 完成", index + 1, agent.name()),
                    ));
                }
                Err(e) if e.is_run_fatal() => {
                    run.state = ExecutorState::Failed;
                    run.plan.steps[index].fail(&e);
                    tracing::warn!(step = %id, error = %e, "dynamic run aborted");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(step = %id, error = %e, "step failed, continuing");
                    run.plan.steps[index].fail(&e);
                    if !run.failed_steps.contains(&id) {
                        run.failed_steps.push(id);
                    }
                    ctx.record(
                        Record::supervisor(
                            EXECUTOR_NAME,
                            format!("步骤 {}: {} 执行失败", index + 1, agent.name()),
                        )
                        .with_text(e.to_string()),
                    );
                }
            }
        }
        Ok(())
    }

    async fn run_step(
        &self,
        run: &mut DynamicRun,
        index: usize,
        ctx: &RunContext,
    ) -> Result<(), OrchestrationError> {
        let kind = run.plan.steps[index].agent;
        let agent = self.registry.get(kind);

        let adapted = self.gatekeeper.make_params(agent.spec(), &run.pool, ctx).await?;
        let input = adapted.target_agent_input.clone();
        {
            let step = &mut run.plan.steps[index];
            step.input = Some(input.clone());
            step.adaptation = Some(adapted);
        }

        let structured = agent.produce_structured(&input, ctx).await?;
        let text = agent.render(&structured, ctx);
        let (raw, value) = structured.into_parts();

        run.pool.push(kind.name(), text.clone(), value);
        run.plan.steps[index].complete(StepOutput { text, json: raw });
        Ok(())
    }
}
