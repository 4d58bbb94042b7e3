//! # Analyzer Skill
//!
//! Extracts destination, duration, dates and budget from the user's free
//! text. Advertises `get_current_date` so relative dates ("明天", "国庆节")
//! can be resolved.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::ModelGateway;
use crate::json::{joined_text, text_list, text_or_number};
use crate::swarm::{OrchestrationError, Record, RunContext};
use crate::tools::{CurrentDateTool, ToolBox};

use super::llm_helpers::run_expert;
use super::{required, AgentKind, AgentSpec, ExpertAgent, RenderError, StructuredResult};

/// Longest trip the analyzer will expand dates for
const MAX_TRIP_DAYS: u32 = 60;

/// The analyzer's artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelAnalysis {
    #[serde(default, deserialize_with = "text_or_number")]
    pub destination: String,
    /// Number of days, digits only
    #[serde(default, deserialize_with = "text_or_number")]
    pub duration: String,
    /// `YYYY-MM-DD`
    #[serde(default, deserialize_with = "text_or_number")]
    pub start_date: String,
    /// Comma-separated `YYYY-MM-DD` dates
    #[serde(default, deserialize_with = "joined_text")]
    pub all_dates: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub budget: String,
    #[serde(default, deserialize_with = "text_list")]
    pub preferences: Vec<String>,
    #[serde(default, deserialize_with = "joined_text")]
    pub extra_requirements: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub travelers: String,
}

impl TravelAnalysis {
    pub fn dates(&self) -> Vec<String> {
        self.all_dates
            .split([',', '，'])
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Input the weather agent expects
    pub fn weather_query(&self) -> String {
        format!(
            "旅行地点: {};旅行日期: {}",
            self.destination.trim(),
            self.dates().join(",")
        )
    }
}

/// Every date of a trip starting on `start` and lasting `duration` days
///
/// Returns `None` unless `start` is `YYYY-MM-DD` and `duration` is a whole
/// number of days between 1 and 60 (a trailing `天` is accepted).
pub fn expand_dates(start: &str, duration: &str) -> Option<Vec<String>> {
    let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").ok()?;
    let days: u32 = duration.trim().trim_end_matches('天').trim().parse().ok()?;
    if days == 0 || days > MAX_TRIP_DAYS {
        return None;
    }

    Some(
        (0..days)
            .map(|offset| {
                (start + Duration::days(i64::from(offset)))
                    .format("%Y-%m-%d")
                    .to_string()
            })
            .collect(),
    )
}

/// Fill `allDates` from `startDate` + `duration` when the model left it out
fn complete_dates(structured: StructuredResult) -> StructuredResult {
    let (_, mut value) = structured.clone().into_parts();
    let Some(object) = value.as_object_mut() else {
        return structured;
    };

    let has_dates = object
        .get("allDates")
        .map(|v| match v {
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Array(a) => !a.is_empty(),
            serde_json::Value::Null => false,
            _ => true,
        })
        .unwrap_or(false);
    if has_dates {
        return structured;
    }

    let Ok(analysis) = structured.decode::<TravelAnalysis>() else {
        return structured;
    };
    match expand_dates(&analysis.start_date, &analysis.duration) {
        Some(dates) => {
            tracing::debug!(count = dates.len(), "derived allDates from startDate and duration");
            object.insert("allDates".into(), serde_json::Value::String(dates.join(",")));
            StructuredResult::from_value(value)
        }
        None => structured,
    }
}

pub struct AnalyzerSkill {
    spec: AgentSpec,
    gateway: ModelGateway,
    tools: ToolBox,
}

impl AnalyzerSkill {
    pub fn new(gateway: ModelGateway, date: CurrentDateTool) -> Self {
        Self {
            spec: AgentSpec::for_kind(AgentKind::Analyzer),
            gateway,
            tools: ToolBox::new().with_tool(Arc::new(date)),
        }
    }
}

#[async_trait]
impl ExpertAgent for AnalyzerSkill {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    #[tracing::instrument(skip_all, fields(agent = "AnalyzerAgent"))]
    async fn produce_structured(
        &self,
        query: &str,
        ctx: &RunContext,
    ) -> Result<StructuredResult, OrchestrationError> {
        ctx.record(Record::agent(self.spec.name, "开始分析...").with_text(query));

        let structured = run_expert(&self.gateway, &self.spec, query, &self.tools, ctx).await?;
        let structured = complete_dates(structured);

        ctx.record(Record::agent(self.spec.name, "分析完成").with_json(structured.raw()));
        Ok(structured)
    }

    fn render_text(&self, structured: &StructuredResult) -> Result<String, RenderError> {
        let analysis: TravelAnalysis = structured
            .decode()
            .map_err(|e| RenderError::UnexpectedShape(e.to_string()))?;

        let destination = required(&analysis.destination, "destination")?;
        let duration = required(&analysis.duration, "duration")?;
        let start_date = required(&analysis.start_date, "startDate")?;

        let preferences = if analysis.preferences.is_empty() {
            "观光".to_string()
        } else {
            analysis.preferences.join("、")
        };
        let budget = match analysis.budget.trim() {
            "" => "中等",
            b => b,
        };
        let travelers = match analysis.travelers.trim() {
            "" => "1",
            t => t,
        };

        let mut text = format!(
            "用户旅行意图分析结果:\n\
             🏕️ **目的地**：{destination}\n\
             ⏰ **旅行天数**：{duration}天\n\
             📅 **出发时间**：{start_date}\n\
             📅 **所有日期**：{}\n\
             🎯 **偏好类型**：{preferences}\n\
             💰 **预算范围**：{budget}\n\
             👥 **出行人数**：{travelers}人",
            analysis.dates().join(","),
        );
        if !analysis.extra_requirements.trim().is_empty() {
            text.push_str(&format!("\n📝 **额外要求**：{}", analysis.extra_requirements.trim()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedBackend;
    use crate::gateway::ChatRole;
    use crate::swarm::{MemoryRecorder, RecordKind};

    const SCENARIO_QUERY: &str = "2025年7月1日去北京3天，预算1200元，我喜欢自然风光, 最想去故宫";

    fn skill(backend: Arc<ScriptedBackend>) -> AnalyzerSkill {
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        AnalyzerSkill::new(ModelGateway::new(backend), CurrentDateTool::fixed(date))
    }

    #[test]
    fn test_expand_dates() {
        assert_eq!(
            expand_dates("2025-07-01", "3").unwrap(),
            vec!["2025-07-01", "2025-07-02", "2025-07-03"]
        );
        assert_eq!(
            expand_dates("2025-12-31", "2天").unwrap(),
            vec!["2025-12-31", "2026-01-01"]
        );
        assert!(expand_dates("明天", "3").is_none());
        assert!(expand_dates("2025-07-01", "0").is_none());
        assert!(expand_dates("2025-07-01", "三").is_none());
    }

    #[tokio::test]
    async fn test_scenario_beijing_three_days() {
        let backend = Arc::new(ScriptedBackend::new().text(
            r#"```json
{"destination":"北京","duration":3,"startDate":"2025-07-01",
 "allDates":"2025-07-01,2025-07-02,2025-07-03","budget":"1200",
 "preferences":"自然风光","extraRequirements":"去故宫"}
```"#,
        ));
        let skill = skill(backend.clone());
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = RunContext::new(recorder.clone());

        let structured = skill.produce_structured(SCENARIO_QUERY, &ctx).await.unwrap();
        let analysis: TravelAnalysis = structured.decode().unwrap();

        assert_eq!(analysis.destination, "北京");
        assert_eq!(analysis.duration, "3");
        assert_eq!(analysis.start_date, "2025-07-01");
        assert_eq!(analysis.all_dates, "2025-07-01,2025-07-02,2025-07-03");
        assert_eq!(analysis.budget, "1200");
        assert_eq!(
            analysis.weather_query(),
            "旅行地点: 北京;旅行日期: 2025-07-01,2025-07-02,2025-07-03"
        );

        let request = &backend.requests()[0];
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[1].content, SCENARIO_QUERY);
        assert_eq!(request.tools[0].name, "get_current_date");

        let records = recorder.records();
        assert_eq!(records.first().unwrap().description, "开始分析...");
        assert_eq!(records.last().unwrap().description, "分析完成");
    }

    #[tokio::test]
    async fn test_relative_date_uses_tool() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .tool_call("c1", "get_current_date", "{}")
                .text(r#"{"destination":"成都","duration":"2","startDate":"2025-07-01","budget":800}"#),
        );
        let skill = skill(backend.clone());
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = RunContext::new(recorder.clone());

        let structured = skill.produce_structured("明天去成都玩两天", &ctx).await.unwrap();

        // allDates derived deterministically
        assert_eq!(structured.value()["allDates"], "2025-07-01,2025-07-02");
        assert_eq!(backend.requests()[1].messages[3].content, "当前日期是2025-06-30");
        assert!(recorder
            .records()
            .iter()
            .any(|r| r.kind == RecordKind::Tool && r.name == "get_current_date"));
    }

    #[tokio::test]
    async fn test_prose_reply_is_parse_error() {
        let backend = Arc::new(ScriptedBackend::new().text("请告诉我您想去哪里"));
        let err = skill(backend)
            .produce_structured("随便走走", &RunContext::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Parse { .. }));
    }

    #[test]
    fn test_render_contains_mandatory_fields() {
        let skill = skill(Arc::new(ScriptedBackend::new()));
        let structured = StructuredResult::from_value(serde_json::json!({
            "destination": "北京",
            "duration": 3,
            "startDate": "2025-07-01",
            "allDates": "2025-07-01,2025-07-02,2025-07-03",
            "budget": "1200"
        }));

        let text = skill.render_text(&structured).unwrap();
        assert!(text.contains("北京"));
        assert!(text.contains("3天"));
        assert!(text.contains("2025-07-01,2025-07-02,2025-07-03"));
        assert!(text.contains("观光"));
        assert!(text.contains("1人"));

        // rendering is a pure function of its input
        assert_eq!(text, skill.render_text(&structured).unwrap());
    }

    #[test]
    fn test_render_failures_become_text() {
        let skill = skill(Arc::new(ScriptedBackend::new()));
        let ctx = RunContext::detached();

        let missing = StructuredResult::from_value(serde_json::json!({"duration": 3}));
        assert_eq!(
            skill.render_text(&missing),
            Err(RenderError::MissingField("destination"))
        );
        assert!(skill.render(&missing, &ctx).starts_with("需求组织失败: "));

        let garbage = skill.render_str("{destination:", &ctx);
        assert!(garbage.starts_with("需求组织失败: invalid JSON"));
        assert_eq!(garbage, skill.render_str("{destination:", &ctx));
    }
}
