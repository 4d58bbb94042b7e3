//! # GateKeeper
//!
//! Parameter adapter for the dynamic path. Given the output pool and the
//! next agent's input contract, asks the model to select and reformat pooled
//! data into that agent's input string. It never generates new facts; the
//! prompt forbids it and the pool dump is the only data it sees.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::{ChatMessage, ModelGateway};
use crate::json::{parse_reply, scalar_text, text_list};
use crate::skills::prompts;
use crate::skills::AgentSpec;

use super::events::Record;
use super::pool::OutputPool;
use super::{OrchestrationError, RunContext};

/// Record producer name
pub const GATEKEEPER_NAME: &str = "GateKeeper";

/// The adapter's answer for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptedInput {
    #[serde(default, deserialize_with = "input_text")]
    pub target_agent_input: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, deserialize_with = "text_list")]
    pub used_sources: Vec<String>,
    #[serde(default, deserialize_with = "confidence")]
    pub confidence: Option<f64>,
}

/// Models sometimes answer with an object instead of a string; keep it as JSON text
fn input_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value).unwrap_or_else(|| value.to_string()))
}

fn confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Builds agent inputs from the output pool
#[derive(Clone)]
pub struct GateKeeper {
    gateway: ModelGateway,
}

impl GateKeeper {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    fn system_prompt(target: &AgentSpec) -> String {
        prompts::fill(
            prompts::GATEKEEPER,
            &[
                ("agent_name", target.name),
                ("description", target.description),
                ("input_format", target.input_format),
                ("input_example", target.input_example),
            ],
        )
    }

    fn user_prompt(pool: &OutputPool) -> String {
        format!(
            "## 输出池中的数据\n{}\n\n请根据目标Agent的输入要求, 从输出池中选择合适的数据并转换格式.",
            pool.describe()
        )
    }

    /// Produce the input for `target` from everything pooled so far
    pub async fn make_params(
        &self,
        target: &AgentSpec,
        pool: &OutputPool,
        ctx: &RunContext,
    ) -> Result<AdaptedInput, OrchestrationError> {
        ctx.check_cancelled()?;
        ctx.record(Record::supervisor(
            GATEKEEPER_NAME,
            format!("为 {} 准备输入参数...", target.name),
        ));

        let messages = vec![
            ChatMessage::system(Self::system_prompt(target)),
            ChatMessage::user(Self::user_prompt(pool)),
        ];

        let outcome = match self.gateway.complete(messages, ctx.cancel_token()).await {
            Ok(reply) => parse_adapted(target, &reply),
            Err(e) => Err(OrchestrationError::gateway(GATEKEEPER_NAME, e)),
        };

        match &outcome {
            Ok(adapted) => {
                tracing::debug!(
                    agent = target.name,
                    sources = ?adapted.used_sources,
                    "input prepared"
                );
                ctx.record(
                    Record::supervisor(GATEKEEPER_NAME, format!("为 {} 准备输入参数完成", target.name))
                        .with_json(serde_json::to_string(adapted).unwrap_or_default()),
                );
            }
            Err(e) => {
                tracing::warn!(agent = target.name, error = %e, "input preparation failed");
                ctx.record(
                    Record::supervisor(GATEKEEPER_NAME, format!("为 {} 准备输入参数失败", target.name))
                        .with_text(e.to_string()),
                );
            }
        }
        outcome
    }
}

fn parse_adapted(target: &AgentSpec, reply: &str) -> Result<AdaptedInput, OrchestrationError> {
    let adaptation_error = |reason: String| OrchestrationError::Adaptation {
        agent: target.name.to_string(),
        reason,
    };

    let value = parse_reply(reply).map_err(|e| adaptation_error(format!("reply is not JSON: {e}")))?;
    let adapted: AdaptedInput = serde_json::from_value(value)
        .map_err(|e| adaptation_error(format!("unexpected reply shape: {e}")))?;

    if adapted.target_agent_input.trim().is_empty() {
        let reason = if adapted.reasoning.trim().is_empty() {
            "targetAgentInput is empty".to_string()
        } else {
            format!("targetAgentInput is empty ({})", adapted.reasoning.trim())
        };
        return Err(adaptation_error(reason));
    }
    Ok(adapted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedBackend;
    use crate::gateway::{ChatRole, GatewayError};
    use crate::skills::AgentKind;
    use crate::swarm::{MemoryRecorder, RecordKind};
    use std::sync::Arc;

    fn pool() -> OutputPool {
        let mut pool = OutputPool::seeded("2025年7月1日去北京2天");
        pool.push(
            "AnalyzerAgent",
            "目的地: 北京".into(),
            serde_json::json!({"destination": "北京", "allDates": "2025-07-01,2025-07-02"}),
        );
        pool
    }

    #[tokio::test]
    async fn test_make_params() {
        let backend = Arc::new(ScriptedBackend::new().text(
            r#"```json
{"targetAgentInput": "旅行地点: 北京;旅行日期: 2025-07-01,2025-07-02",
 "reasoning": "取自分析结果", "usedSources": ["AnalyzerAgent"], "confidence": "0.95"}
```"#,
        ));
        let gatekeeper = GateKeeper::new(ModelGateway::new(backend.clone()));
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = RunContext::new(recorder.clone());
        let target = AgentSpec::for_kind(AgentKind::Weather);

        let adapted = gatekeeper.make_params(&target, &pool(), &ctx).await.unwrap();

        assert_eq!(adapted.target_agent_input, "旅行地点: 北京;旅行日期: 2025-07-01,2025-07-02");
        assert_eq!(adapted.used_sources, vec!["AnalyzerAgent"]);
        assert_eq!(adapted.confidence, Some(0.95));

        let request = &backend.requests()[0];
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert!(request.messages[0].content.contains("为 **WeatherAgent** 准备输入参数"));
        assert!(request.messages[0].content.contains(target.input_example));
        assert!(request.messages[1].content.contains("2. **来源**: AnalyzerAgent"));

        let records = recorder.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == RecordKind::Supervisor));
        assert_eq!(records[1].description, "为 WeatherAgent 准备输入参数完成");
    }

    #[tokio::test]
    async fn test_object_input_is_kept_as_json_text() {
        let backend = ScriptedBackend::new()
            .text(r#"{"targetAgentInput": {"city": "北京"}, "usedSources": "user"}"#);
        let gatekeeper = GateKeeper::new(ModelGateway::new(Arc::new(backend)));

        let adapted = gatekeeper
            .make_params(&AgentSpec::for_kind(AgentKind::Weather), &pool(), &RunContext::detached())
            .await
            .unwrap();
        assert_eq!(adapted.target_agent_input, r#"{"city":"北京"}"#);
        assert_eq!(adapted.used_sources, vec!["user"]);
        assert_eq!(adapted.confidence, None);
    }

    #[tokio::test]
    async fn test_empty_input_is_adaptation_error() {
        let backend = ScriptedBackend::new()
            .text(r#"{"targetAgentInput": "  ", "reasoning": "输出池中没有天气数据"}"#);
        let gatekeeper = GateKeeper::new(ModelGateway::new(Arc::new(backend)));

        let err = gatekeeper
            .make_params(&AgentSpec::for_kind(AgentKind::Planner), &pool(), &RunContext::detached())
            .await
            .unwrap_err();
        match err {
            OrchestrationError::Adaptation { agent, reason } => {
                assert_eq!(agent, "PlannerAgent");
                assert!(reason.contains("输出池中没有天气数据"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prose_reply_is_adaptation_error() {
        let backend = ScriptedBackend::new().text("我无法确定应该使用哪些数据");
        let gatekeeper = GateKeeper::new(ModelGateway::new(Arc::new(backend)));

        let err = gatekeeper
            .make_params(&AgentSpec::for_kind(AgentKind::Weather), &pool(), &RunContext::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Adaptation { .. }));
        assert!(!err.is_run_fatal());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_recorded() {
        let backend = ScriptedBackend::new().fail(GatewayError::Transport("connection reset".into()));
        let gatekeeper = GateKeeper::new(ModelGateway::new(Arc::new(backend)));
        let recorder = Arc::new(MemoryRecorder::new());

        let err = gatekeeper
            .make_params(
                &AgentSpec::for_kind(AgentKind::Weather),
                &pool(),
                &RunContext::new(recorder.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestrationError::Gateway { .. }));
        let last = recorder.records().pop().unwrap();
        assert_eq!(last.description, "为 WeatherAgent 准备输入参数失败");
        assert!(last.content.contains("connection reset"));
    }
}
