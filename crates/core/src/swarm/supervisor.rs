//! # Supervisor
//!
//! Dynamic planner: one model call that sees every expert's full role prompt
//! and answers with the ordered list of agents to run. The plan is validated
//! when it is built; unknown agent names never reach the executor.

use serde::Deserialize;
use serde_json::Value;

use crate::gateway::{ChatMessage, ModelGateway};
use crate::json::{parse_reply, scalar_text};
use crate::skills::{prompts, AgentKind, AgentSpec};

use super::events::Record;
use super::plan::TaskPlan;
use super::{OrchestrationError, RunContext};

/// Record producer name
pub const SUPERVISOR_NAME: &str = "Supervisor";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlannedAgent {
    agent_name: String,
    #[serde(default)]
    reason: Value,
}

/// Plans which agents run, and in what order
#[derive(Clone)]
pub struct Supervisor {
    gateway: ModelGateway,
    system_prompt: String,
}

impl Supervisor {
    pub fn new(gateway: ModelGateway, specs: &[&AgentSpec]) -> Self {
        Self {
            gateway,
            system_prompt: planning_prompt(specs),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Ask the model for a plan
    #[tracing::instrument(skip(self, query, ctx), fields(run_id = %ctx.run_id()))]
    pub async fn plan(&self, query: &str, ctx: &RunContext) -> Result<TaskPlan, OrchestrationError> {
        ctx.check_cancelled()?;
        ctx.record(Record::supervisor(SUPERVISOR_NAME, "开始规划任务...").with_text(query));

        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(format!("用户输入为: \"{query}\"")),
        ];

        let outcome = match self.gateway.complete(messages, ctx.cancel_token()).await {
            Ok(reply) => parse_plan(query, &reply),
            Err(e) => match OrchestrationError::gateway(SUPERVISOR_NAME, e) {
                OrchestrationError::Cancelled => Err(OrchestrationError::Cancelled),
                other => Err(OrchestrationError::Planning(other.to_string())),
            },
        };

        match &outcome {
            Ok(plan) => {
                tracing::info!(agents = ?plan.agents(), "plan ready");
                ctx.record(
                    Record::supervisor(SUPERVISOR_NAME, "任务规划完成")
                        .with_json(serde_json::to_string(&plan.steps).unwrap_or_default()),
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "planning failed");
                ctx.record(Record::supervisor(SUPERVISOR_NAME, "任务规划失败").with_text(e.to_string()));
            }
        }
        outcome
    }
}

/// System prompt listing every agent's name and full role prompt
pub fn planning_prompt(specs: &[&AgentSpec]) -> String {
    let names: Vec<&str> = specs.iter().map(|s| s.name).collect();
    let team = specs
        .iter()
        .map(|spec| format!("### {}\n{}", spec.name, spec.system_prompt.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let listed = names.join(", ");
    let choice = names.join(" | ");
    prompts::fill(
        prompts::SUPERVISOR,
        &[
            ("agent_names", listed.as_str()),
            ("team", team.as_str()),
            ("agent_names_choice", choice.as_str()),
        ],
    )
}

/// Turn the model's reply into a validated plan
pub fn parse_plan(query: &str, reply: &str) -> Result<TaskPlan, OrchestrationError> {
    let value = parse_reply(reply)
        .map_err(|e| OrchestrationError::Planning(format!("plan is not JSON: {e}")))?;

    let items: Vec<PlannedAgent> = serde_json::from_value(value)
        .map_err(|e| OrchestrationError::Planning(format!("plan is not a list of agents: {e}")))?;

    if items.is_empty() {
        return Err(OrchestrationError::Planning("plan has no steps".to_string()));
    }

    let agents = items
        .into_iter()
        .map(|item| {
            let kind = AgentKind::from_name(&item.agent_name)
                .map_err(|e| OrchestrationError::Planning(e.to_string()))?;
            let reason = scalar_text(&item.reason).unwrap_or_else(|| item.reason.to_string());
            Ok((kind, reason))
        })
        .collect::<Result<Vec<_>, OrchestrationError>>()?;

    Ok(TaskPlan::new(query, agents))
}
