//! # LLM Helpers
//!
//! Shared conversation plumbing for the expert agents: one system prompt,
//! one user message, optional tools whose every invocation is recorded.

use async_trait::async_trait;

use crate::gateway::{ChatMessage, GatewayError, ModelGateway, ToolCall, ToolHandler};
use crate::swarm::{OrchestrationError, Record, RunContext};
use crate::tools::ToolBox;

use super::{AgentSpec, StructuredResult};

/// Run an agent's conversation and validate the final answer as JSON
///
/// Failures are recorded under the agent's name before they propagate.
pub async fn run_expert(
    gateway: &ModelGateway,
    spec: &AgentSpec,
    query: &str,
    tools: &ToolBox,
    ctx: &RunContext,
) -> Result<StructuredResult, OrchestrationError> {
    let messages = vec![
        ChatMessage::system(spec.system_prompt.clone()),
        ChatMessage::user(query),
    ];

    let reply = if tools.is_empty() {
        gateway.complete(messages, ctx.cancel_token()).await
    } else {
        let handler = RecordingToolHandler::new(tools, ctx);
        gateway
            .complete_with_tools(messages, &tools.schemas(), &handler, ctx.cancel_token())
            .await
    };

    let outcome = reply
        .map_err(|e| OrchestrationError::gateway(spec.name, e))
        .and_then(|text| StructuredResult::parse(spec.name, &text));

    if let Err(e) = &outcome {
        tracing::warn!(agent = spec.name, error = %e, "agent produced no structured result");
        ctx.record(Record::agent(spec.name, "执行失败").with_text(e.to_string()));
    }
    outcome
}

/// Executes tool calls from a [`ToolBox`] and records each one
pub struct RecordingToolHandler<'a> {
    tools: &'a ToolBox,
    ctx: &'a RunContext,
}

impl<'a> RecordingToolHandler<'a> {
    pub fn new(tools: &'a ToolBox, ctx: &'a RunContext) -> Self {
        Self { tools, ctx }
    }
}

#[async_trait]
impl ToolHandler for RecordingToolHandler<'_> {
    async fn call_tool(&self, call: &ToolCall) -> Result<String, GatewayError> {
        let Some(tool) = self.tools.find(&call.name) else {
            tracing::warn!(tool = %call.name, "model requested an unknown tool");
            return Ok(format!("未知工具: {}", call.name));
        };

        let args = call.parsed_arguments().map_err(|e| GatewayError::Tool {
            tool: call.name.clone(),
            message: format!("arguments are not JSON: {e}"),
        })?;

        self.ctx.record(
            Record::tool(tool.name(), format!("开始{}...", tool.label())).with_value(&args),
        );

        match tool.execute(args).await {
            Ok(output) => {
                let record = Record::tool(tool.name(), format!("{}完成", tool.label()));
                let record = match output.as_str() {
                    Some(text) => record.with_text(text),
                    None => record.with_value(&output),
                };
                self.ctx.record(record);
                Ok(tool.observation(&output))
            }
            Err(e) => {
                tracing::warn!(tool = tool.name(), error = %e, "tool failed");
                self.ctx.record(
                    Record::tool(tool.name(), format!("{}失败", tool.label())).with_text(e.to_string()),
                );
                Err(GatewayError::Tool {
                    tool: tool.name().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::{MemoryRecorder, RecordKind};
    use crate::tools::CurrentDateTool;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn date_tools() -> ToolBox {
        let date = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        ToolBox::new().with_tool(Arc::new(CurrentDateTool::fixed(date)))
    }

    #[tokio::test]
    async fn test_tool_calls_are_recorded() {
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = RunContext::new(recorder.clone());
        let tools = date_tools();
        let handler = RecordingToolHandler::new(&tools, &ctx);

        let observation = handler
            .call_tool(&ToolCall {
                id: "1".into(),
                name: "get_current_date".into(),
                arguments: "{}".into(),
            })
            .await
            .unwrap();

        assert_eq!(observation, "当前日期是2025-09-30");
        let records = recorder.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == RecordKind::Tool));
        assert_eq!(records[1].content, "2025-09-30");
    }

    #[tokio::test]
    async fn test_unknown_tool_gets_observation() {
        let ctx = RunContext::detached();
        let tools = date_tools();
        let handler = RecordingToolHandler::new(&tools, &ctx);

        let observation = handler
            .call_tool(&ToolCall {
                id: "1".into(),
                name: "book_hotel".into(),
                arguments: "{}".into(),
            })
            .await
            .unwrap();
        assert_eq!(observation, "未知工具: book_hotel");
    }

    #[tokio::test]
    async fn test_malformed_arguments() {
        let ctx = RunContext::detached();
        let tools = date_tools();
        let handler = RecordingToolHandler::new(&tools, &ctx);

        let err = handler
            .call_tool(&ToolCall {
                id: "1".into(),
                name: "get_current_date".into(),
                arguments: "{not json".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Tool { .. }));
    }
}
