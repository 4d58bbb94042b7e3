//! Task plan produced by the supervisor and mutated by the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::skills::AgentKind;

use super::gatekeeper::AdaptedInput;

/// What a completed step produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    pub text: String,
    pub json: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Done,
    Failed,
}

/// One agent invocation in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub agent: AgentKind,
    /// Why the planner chose this agent
    pub reason: String,
    /// Input the agent was actually called with
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub adaptation: Option<AdaptedInput>,
    #[serde(default)]
    pub outputs: Option<StepOutput>,
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Times the step has been executed
    pub attempts: u32,
}

impl PlanStep {
    pub fn new(index: usize, agent: AgentKind, reason: impl Into<String>) -> Self {
        Self {
            id: format!("step_{}_{}", index + 1, agent.component_id()),
            agent,
            reason: reason.into(),
            input: None,
            adaptation: None,
            outputs: None,
            done: false,
            error: None,
            attempts: 0,
        }
    }

    pub fn status(&self) -> StepStatus {
        if self.done {
            StepStatus::Done
        } else if self.error.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Pending
        }
    }

    pub fn complete(&mut self, output: StepOutput) {
        self.outputs = Some(output);
        self.done = true;
        self.error = None;
    }

    pub fn fail(&mut self, error: impl ToString) {
        self.done = false;
        self.error = Some(error.to_string());
    }
}

/// Ordered steps plus the query they were planned for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub id: String,
    pub query: String,
    pub steps: Vec<PlanStep>,
    pub created_at: DateTime<Utc>,
}

impl TaskPlan {
    pub fn new(query: &str, agents: Vec<(AgentKind, String)>) -> Self {
        let steps = agents
            .into_iter()
            .enumerate()
            .map(|(i, (agent, reason))| PlanStep::new(i, agent, reason))
            .collect();
        Self {
            id: format!("plan_{}", uuid::Uuid::new_v4()),
            query: query.to_string(),
            steps,
            created_at: Utc::now(),
        }
    }

    pub fn agents(&self) -> Vec<AgentKind> {
        self.steps.iter().map(|s| s.agent).collect()
    }
}
