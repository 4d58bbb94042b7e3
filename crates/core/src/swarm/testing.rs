//! Fake agents for coordinator and executor tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::gateway::GatewayError;
use crate::skills::{AgentKind, AgentRegistry, AgentSpec, ExpertAgent, RenderError, StructuredResult};

use super::{OrchestrationError, RunContext};

pub(crate) enum Reply {
    Json(Value),
    Prose(&'static str),
    GatewayDown,
}

/// Shared call log: (agent, query) in call order
pub(crate) type CallLog = Arc<Mutex<Vec<(AgentKind, String)>>>;

pub(crate) struct FakeAgent {
    spec: AgentSpec,
    log: CallLog,
    replies: Mutex<VecDeque<Reply>>,
}

impl FakeAgent {
    pub(crate) fn new(kind: AgentKind, log: CallLog) -> Self {
        Self {
            spec: AgentSpec::for_kind(kind),
            log,
            replies: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn then(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }
}

pub(crate) fn canned(kind: AgentKind) -> Value {
    match kind {
        AgentKind::Analyzer => json!({
            "destination": "北京",
            "duration": 2,
            "startDate": "2025-07-01",
            "allDates": "2025-07-01,2025-07-02",
            "budget": "1200"
        }),
        AgentKind::Weather => json!([
            {"date": "2025-07-01", "weather": "晴", "high": "34°C", "low": "24°C", "recommendations": "防晒"},
            {"date": "2025-07-02", "weather": "多云", "high": "32°C", "low": "23°C", "recommendations": "适合出行"}
        ]),
        AgentKind::Planner => json!([
            {"date": "2025-07-01", "plan": [{"time": "上午", "activity": "故宫", "notes": ""}], "generalTips": "防晒"},
            {"date": "2025-07-02", "plan": [{"time": "上午", "activity": "长城", "notes": ""}], "generalTips": "带水"}
        ]),
    }
}

#[async_trait]
impl ExpertAgent for FakeAgent {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    async fn produce_structured(
        &self,
        query: &str,
        ctx: &RunContext,
    ) -> Result<StructuredResult, OrchestrationError> {
        ctx.check_cancelled()?;
        self.log
            .lock()
            .unwrap()
            .push((self.spec.kind, query.to_string()));

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Json(value)) => Ok(StructuredResult::from_value(value)),
            Some(Reply::Prose(text)) => StructuredResult::parse(self.spec.name, text),
            Some(Reply::GatewayDown) => Err(OrchestrationError::gateway(
                self.spec.name,
                GatewayError::Status {
                    status: 503,
                    body: "unavailable".into(),
                },
            )),
            None => Ok(StructuredResult::from_value(canned(self.spec.kind))),
        }
    }

    fn render_text(&self, structured: &StructuredResult) -> Result<String, RenderError> {
        Ok(format!("{} rendered {}", self.spec.name, structured.raw()))
    }
}

/// Registry of fakes sharing one call log
pub(crate) fn fake_team(
    analyzer: FakeAgent,
    weather: FakeAgent,
    planner: FakeAgent,
) -> AgentRegistry {
    AgentRegistry::builder()
        .with_agent(Arc::new(analyzer))
        .with_agent(Arc::new(weather))
        .with_agent(Arc::new(planner))
        .build()
        .unwrap()
}

pub(crate) fn default_team(log: &CallLog) -> AgentRegistry {
    fake_team(
        FakeAgent::new(AgentKind::Analyzer, log.clone()),
        FakeAgent::new(AgentKind::Weather, log.clone()),
        FakeAgent::new(AgentKind::Planner, log.clone()),
    )
}
