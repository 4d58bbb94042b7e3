//! # Planner Skill
//!
//! Turns the analysis and weather text into a day-by-day itinerary. Uses no
//! tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::gateway::ModelGateway;
use crate::json::text_or_number;
use crate::swarm::{OrchestrationError, Record, RunContext};
use crate::tools::ToolBox;

use super::llm_helpers::run_expert;
use super::{decode_days, required, AgentKind, AgentSpec, ExpertAgent, RenderError, StructuredResult};

/// One time slot of a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSlot {
    #[serde(default, deserialize_with = "text_or_number")]
    pub time: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub activity: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub notes: String,
}

/// One day of the itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayItinerary {
    #[serde(deserialize_with = "text_or_number")]
    pub date: String,
    #[serde(default)]
    pub plan: Vec<PlanSlot>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub general_tips: String,
}

pub struct PlannerSkill {
    spec: AgentSpec,
    gateway: ModelGateway,
    tools: ToolBox,
}

impl PlannerSkill {
    pub fn new(gateway: ModelGateway) -> Self {
        Self {
            spec: AgentSpec::for_kind(AgentKind::Planner),
            gateway,
            tools: ToolBox::new(),
        }
    }
}

#[async_trait]
impl ExpertAgent for PlannerSkill {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    #[tracing::instrument(skip_all, fields(agent = "PlannerAgent"))]
    async fn produce_structured(
        &self,
        query: &str,
        ctx: &RunContext,
    ) -> Result<StructuredResult, OrchestrationError> {
        ctx.record(Record::agent(self.spec.name, "开始制定行程...").with_text(query));
        let structured = run_expert(&self.gateway, &self.spec, query, &self.tools, ctx).await?;
        ctx.record(Record::agent(self.spec.name, "制定行程完成").with_json(structured.raw()));
        Ok(structured)
    }

    fn render_text(&self, structured: &StructuredResult) -> Result<String, RenderError> {
        let days: Vec<DayItinerary> = decode_days(structured)?;

        let (Some(first), Some(last)) = (days.first(), days.last()) else {
            return Err(RenderError::EmptyArray);
        };
        let first = required(&first.date, "date")?;
        let last = required(&last.date, "date")?;

        let mut text = format!(
            "**🎯 {}天行程规划完成！**\n\n**📅 行程时间：** {first} 至 {last}\n",
            days.len()
        );

        for (index, day) in days.iter().enumerate() {
            let date = required(&day.date, "date")?;
            text.push_str(&format!("\n**第{}天 ({date})**\n", index + 1));
            for slot in &day.plan {
                text.push_str(&format!("🕐 {}：{}\n", slot.time.trim(), slot.activity.trim()));
                if !slot.notes.trim().is_empty() {
                    text.push_str(&format!("   📝 {}\n", slot.notes.trim()));
                }
            }
            if !day.general_tips.trim().is_empty() {
                text.push_str(&format!("💡 **当日建议：** {}\n", day.general_tips.trim()));
            }
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedBackend;
    use std::sync::Arc;

    fn skill(backend: Arc<ScriptedBackend>) -> PlannerSkill {
        PlannerSkill::new(ModelGateway::new(backend))
    }

    fn two_days() -> serde_json::Value {
        serde_json::json!([
            {
                "date": "2025-07-01",
                "plan": [
                    {"time": "上午", "activity": "游览【故宫】", "notes": "提前预约门票"},
                    {"time": "下午", "activity": "漫步景山公园", "notes": ""}
                ],
                "generalTips": "天气炎热, 注意防晒"
            },
            {
                "date": "2025-07-02",
                "plan": [{"time": "上午", "activity": "登长城", "notes": "穿舒适的鞋"}],
                "generalTips": "带足饮用水"
            }
        ])
    }

    #[tokio::test]
    async fn test_planner_sends_no_tools() {
        let backend = Arc::new(ScriptedBackend::new().text(&two_days().to_string()));
        let skill = skill(backend.clone());

        let structured = skill
            .produce_structured("用户旅行意图分析结果: ...", &RunContext::detached())
            .await
            .unwrap();

        assert!(backend.requests()[0].tools.is_empty());
        let days: Vec<DayItinerary> = structured.decode().unwrap();
        assert_eq!(days[0].plan.len(), 2);
        assert_eq!(days[1].general_tips, "带足饮用水");
    }

    #[test]
    fn test_render_one_entry_per_day() {
        let skill = skill(Arc::new(ScriptedBackend::new()));
        let structured = StructuredResult::from_value(two_days());

        let text = skill.render_text(&structured).unwrap();
        assert!(text.contains("2天行程规划"));
        assert!(text.contains("2025-07-01 至 2025-07-02"));
        assert!(text.contains("**第1天 (2025-07-01)**"));
        assert!(text.contains("**第2天 (2025-07-02)**"));
        assert!(text.contains("🕐 上午：游览【故宫】"));
        assert!(text.contains("📝 提前预约门票"));
        assert_eq!(text, skill.render_text(&structured).unwrap());
    }

    #[test]
    fn test_render_failures() {
        let skill = skill(Arc::new(ScriptedBackend::new()));
        let ctx = RunContext::detached();

        let empty = StructuredResult::from_value(serde_json::json!([]));
        assert_eq!(skill.render(&empty, &ctx), "行程规划处理失败: expected a non-empty array");

        assert!(skill
            .render_str("not json", &ctx)
            .starts_with("行程规划处理失败: invalid JSON"));
    }
}
