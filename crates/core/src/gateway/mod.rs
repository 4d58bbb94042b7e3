//! # Model Gateway
//!
//! The single choke point through which every language-model call passes.
//!
//! ```text
//! caller ──messages──▶ ModelGateway ──ChatRequest──▶ ChatBackend (HTTP)
//!                          ▲    │
//!                          │    └── ToolCalls ──▶ ToolHandler ──observation──┐
//!                          └─────────────────────────────────────────────────┘
//! ```
//!
//! The tool loop is bounded by [`GatewayLimits::max_tool_rounds`] and every
//! backend round-trip races both a per-call deadline and the run's
//! cancellation token.

pub mod openai;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::ModelConfig;

pub use openai::OpenAiCompatibleBackend;

/// Failures talking to the model (or resolving its tool calls)
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway misconfigured: {0}")]
    Configuration(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
    #[error("model call exceeded its {0:?} deadline")]
    Timeout(Duration),
    #[error("model call cancelled")]
    Cancelled,
    #[error("tool loop exceeded {rounds} rounds without a final answer")]
    ToolLoopExceeded { rounds: usize },
    #[error("tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON text exactly as the model produced it
    pub arguments: String,
}

impl ToolCall {
    /// Arguments as JSON; an empty string means "no arguments"
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content)
    }

    /// The observation answering one tool call
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::plain(ChatRole::Tool, content)
        }
    }
}

/// Function-style tool advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSchema>,
}

/// What one backend round-trip produced
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Final answer
    Text(String),
    /// The model wants tools run; `assistant` is echoed back into the history
    ToolCalls {
        assistant: ChatMessage,
        calls: Vec<ToolCall>,
    },
}

/// One round-trip to a language model
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelReply, GatewayError>;
}

/// Resolves a tool call into the observation text fed back to the model
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call_tool(&self, call: &ToolCall) -> Result<String, GatewayError>;
}

/// Handler for conversations that advertise no tools
pub struct NoTools;

#[async_trait]
impl ToolHandler for NoTools {
    async fn call_tool(&self, call: &ToolCall) -> Result<String, GatewayError> {
        Err(GatewayError::Tool {
            tool: call.name.clone(),
            message: "no tools are available in this conversation".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayLimits {
    /// Tool rounds allowed before the loop fails closed
    pub max_tool_rounds: usize,
    /// Deadline for a single backend round-trip
    pub call_timeout: Duration,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_tool_rounds: 4,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Entry point shared by the expert agents, the planner and the gatekeeper
#[derive(Clone)]
pub struct ModelGateway {
    backend: Arc<dyn ChatBackend>,
    limits: GatewayLimits,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            limits: GatewayLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: GatewayLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Gateway over the OpenAI-compatible HTTP backend described by `config`
    pub fn from_config(config: &ModelConfig, limits: GatewayLimits) -> Result<Self, GatewayError> {
        let backend = OpenAiCompatibleBackend::from_env(config, limits.call_timeout)?;
        Ok(Self::new(Arc::new(backend)).with_limits(limits))
    }

    pub fn limits(&self) -> GatewayLimits {
        self.limits
    }

    /// Plain completion: no tools are advertised
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        self.complete_with_tools(messages, &[], &NoTools, cancel)
            .await
    }

    /// Completion with a bounded tool loop
    ///
    /// Re-queries the model after answering every tool call in a reply, until
    /// it produces text or `max_tool_rounds` rounds have been spent.
    pub async fn complete_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolSchema],
        handler: &dyn ToolHandler,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let mut request = ChatRequest {
            messages,
            tools: tools.to_vec(),
        };
        let mut rounds = 0usize;

        loop {
            match self.round_trip(&request, cancel).await? {
                ModelReply::Text(text) => {
                    tracing::debug!(rounds, chars = text.len(), "model produced final answer");
                    return Ok(text);
                }
                ModelReply::ToolCalls { assistant, calls } => {
                    if rounds >= self.limits.max_tool_rounds {
                        tracing::warn!(rounds, "tool loop limit reached");
                        return Err(GatewayError::ToolLoopExceeded { rounds });
                    }
                    rounds += 1;
                    request.messages.push(assistant);
                    for call in &calls {
                        if cancel.is_cancelled() {
                            return Err(GatewayError::Cancelled);
                        }
                        tracing::debug!(tool = %call.name, args = %call.arguments, "resolving tool call");
                        let observation = handler.call_tool(call).await?;
                        request
                            .messages
                            .push(ChatMessage::tool(call.id.clone(), observation));
                    }
                }
            }
        }
    }

    async fn round_trip(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelReply, GatewayError> {
        let deadline = self.limits.call_timeout;
        tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            outcome = tokio::time::timeout(deadline, self.backend.chat(request)) => match outcome {
                Ok(reply) => reply,
                Err(_) => Err(GatewayError::Timeout(deadline)),
            },
        }
    }
}
