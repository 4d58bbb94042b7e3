//! # Static Coordinator
//!
//! Runs Analyze → Weather → Plan, threading each agent's output into the
//! next agent's input. Every stage is mandatory: the first error aborts the
//! run and no partial results are returned.

use crate::skills::{AgentKind, AgentRegistry, StructuredResult, TravelAnalysis};

use super::events::Record;
use super::pipeline::Pipeline;
use super::{AgentResults, OrchestrationError, RunContext};

/// Record producer name
pub const COORDINATOR_NAME: &str = "StaticCoordinator";

/// Weather input synthesized from the analyzer's JSON, no model call
pub fn weather_input(analysis: &StructuredResult) -> Result<String, OrchestrationError> {
    let parsed: TravelAnalysis = analysis
        .decode()
        .map_err(|e| OrchestrationError::parse(AgentKind::Analyzer.name(), e))?;

    if parsed.destination.trim().is_empty() {
        return Err(OrchestrationError::parse(
            AgentKind::Analyzer.name(),
            "analysis has no destination",
        ));
    }
    if parsed.dates().is_empty() {
        return Err(OrchestrationError::parse(
            AgentKind::Analyzer.name(),
            "analysis has no travel dates",
        ));
    }
    Ok(parsed.weather_query())
}

/// Planner input: analysis text followed by weather text
pub fn planner_input(analysis_text: &str, weather_text: &str) -> String {
    format!(
        "用户旅行意图分析结果:\n{}\n\n用户旅行期间的天气信息与建议:\n{}",
        analysis_text.trim(),
        weather_text.trim()
    )
}

/// The fixed three-stage coordinator
#[derive(Clone)]
pub struct StaticCoordinator {
    registry: AgentRegistry,
}

impl StaticCoordinator {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    /// Run the pipeline on a user query
    #[tracing::instrument(skip(self, query, ctx), fields(run_id = %ctx.run_id()))]
    pub async fn run(&self, query: &str, ctx: &RunContext) -> Result<AgentResults, OrchestrationError> {
        let mut pipeline = Pipeline::new();
        let mut results = AgentResults::default();
        let mut input = query.to_string();

        while let Some(kind) = pipeline.stage.agent() {
            let (started, finished) = pipeline.stage.labels();
            tracing::info!(stage = ?pipeline.stage, agent = kind.name(), "static stage started");
            ctx.record(Record::supervisor(COORDINATOR_NAME, started).with_text(input.clone()));

            match self.run_stage(kind, &input, &mut results, ctx).await {
                Ok(next) => {
                    ctx.record(Record::supervisor(COORDINATOR_NAME, finished));
                    input = next;
                    pipeline.advance();
                }
                Err(e) => {
                    pipeline.fail();
                    tracing::warn!(agent = kind.name(), error = %e, "static pipeline aborted");
                    ctx.record(
                        Record::supervisor(COORDINATOR_NAME, format!("{} 执行失败", kind.name()))
                            .with_text(e.to_string()),
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(success = pipeline.is_success(), "static pipeline finished");
        Ok(results)
    }

    /// Run one agent, store its result and build the next stage's input
    async fn run_stage(
        &self,
        kind: AgentKind,
        input: &str,
        results: &mut AgentResults,
        ctx: &RunContext,
    ) -> Result<String, OrchestrationError> {
        ctx.check_cancelled()?;

        let agent = self.registry.get(kind);
        let structured = agent.produce_structured(input, ctx).await?;
        let text = agent.render(&structured, ctx);

        let next = match kind {
            AgentKind::Analyzer => weather_input(&structured)?,
            AgentKind::Weather => planner_input(&results.analysis.text, &text),
            AgentKind::Planner => String::new(),
        };

        results.fill(kind, text, structured.raw().to_string());
        Ok(next)
    }
}
