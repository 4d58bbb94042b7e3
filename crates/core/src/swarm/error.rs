//! Orchestration error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::skills::AgentKind;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Transport, auth or rate-limit failure talking to the model
    #[error("{component} model call failed: {source}")]
    Gateway {
        component: String,
        #[source]
        source: GatewayError,
    },
    /// A step's output was expected to be JSON and was not
    #[error("{producer} did not return valid JSON: {message}")]
    Parse { producer: String, message: String },
    /// The planner's reply could not be turned into a step list
    #[error("planning failed: {0}")]
    Planning(String),
    /// The gatekeeper could not produce a usable input
    #[error("could not prepare input for {agent}: {reason}")]
    Adaptation { agent: String, reason: String },
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),
    #[error("no {0} agent registered")]
    MissingAgent(AgentKind),
    #[error("run cancelled")]
    Cancelled,
    #[error("run exceeded its {0:?} deadline")]
    RunTimeout(Duration),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl OrchestrationError {
    /// Wrap a gateway failure; cancellation stays a first-class cancellation
    pub fn gateway(component: impl Into<String>, source: GatewayError) -> Self {
        match source {
            GatewayError::Cancelled => OrchestrationError::Cancelled,
            source => OrchestrationError::Gateway {
                component: component.into(),
                source,
            },
        }
    }

    pub fn parse(producer: impl Into<String>, message: impl ToString) -> Self {
        OrchestrationError::Parse {
            producer: producer.into(),
            message: message.to_string(),
        }
    }

    /// Errors that end a dynamic run instead of being contained in one step
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            OrchestrationError::Cancelled
                | OrchestrationError::RunTimeout(_)
                | OrchestrationError::Planning(_)
                | OrchestrationError::InvalidState(_)
        )
    }
}
