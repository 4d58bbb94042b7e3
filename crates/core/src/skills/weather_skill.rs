//! # Weather Skill
//!
//! Looks up the destination's forecast for each travel date and turns it
//! into per-day advice.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::gateway::ModelGateway;
use crate::json::text_or_number;
use crate::swarm::{OrchestrationError, Record, RunContext};
use crate::tools::{ForecastTool, LocationLookupTool, QWeatherClient, ToolBox, NO_WEATHER_INFO};

use super::analyzer_skill::expand_dates;
use super::llm_helpers::run_expert;
use super::{decode_days, required, AgentKind, AgentSpec, ExpertAgent, RenderError, StructuredResult};

/// One travel day in the weather agent's artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    #[serde(deserialize_with = "text_or_number")]
    pub date: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub weather: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub high: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub low: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub recommendations: String,
}

impl WeatherDay {
    pub fn has_forecast(&self) -> bool {
        !self.weather.trim().is_empty() && self.weather.trim() != NO_WEATHER_INFO
    }
}

/// Generic advice for a destination on a date without forecast data
pub fn seasonal_advice(destination: &str, date: &str) -> String {
    let place = match destination.trim() {
        "" => "目的地",
        d => d,
    };
    let Ok(day) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
        return "暂无该日天气信息，建议出行前关注当地天气预报，准备适合季节的衣物。".to_string();
    };

    match day.month() {
        3..=5 => format!("出行时值{place}的春季，早晚温差较大，建议携带薄外套，注意防风和花粉过敏。"),
        6..=8 => format!("出行时值{place}的夏季，天气炎热且多阵雨，建议穿轻薄透气的衣物，注意防晒补水并随身携带雨具。"),
        9..=11 => format!("出行时值{place}的秋季，天气凉爽干燥，建议穿长袖并备一件外套，注意补水保湿。"),
        _ => format!("出行时值{place}的冬季，气温较低，建议穿保暖衣物，室外活动时注意防风保暖。"),
    }
}

/// Destination and dates from `旅行地点: X;旅行日期: a,b`
///
/// Tolerates full-width punctuation and either field order.
fn parse_weather_query(query: &str) -> (String, Vec<String>) {
    let mut destination = String::new();
    let mut dates = Vec::new();

    for part in query.split([';', '；', '\n']) {
        let Some((key, value)) = part.split_once([':', '：']) else {
            continue;
        };
        let key = key.trim();
        if key.contains("地点") {
            destination = value.trim().to_string();
        } else if key.contains("日期") {
            dates = value
                .split([',', '，', '、'])
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .flat_map(date_token)
                .collect();
        }
    }
    (destination, dates)
}

/// Dates named by one token: a single `YYYY-MM-DD` or a range `a至b` / `a~b`
///
/// Anything else yields nothing.
fn date_token(token: &str) -> Vec<String> {
    let parse = |d: &str| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok();

    if let Some((from, to)) = token.split_once(['至', '~', '～']) {
        let range = parse(from).zip(parse(to)).and_then(|(from, to)| {
            let days = (to - from).num_days() + 1;
            expand_dates(&from.format("%Y-%m-%d").to_string(), &days.to_string())
        });
        if range.is_none() {
            tracing::debug!(%token, "ignoring unreadable date range");
        }
        return range.unwrap_or_default();
    }

    match parse(token) {
        Some(date) => vec![date.format("%Y-%m-%d").to_string()],
        None => {
            tracing::debug!(%token, "ignoring token that is not a date");
            Vec::new()
        }
    }
}

/// Guarantee an entry with advice for every requested date
///
/// Days the model marked `无天气信息` without advice get [`seasonal_advice`];
/// requested dates the model skipped are added the same way. Result is
/// ordered by date. Non-array results are returned untouched.
fn fill_missing_days(structured: StructuredResult, query: &str) -> StructuredResult {
    if !structured.value().is_array() {
        return structured;
    }
    let (destination, requested) = parse_weather_query(query);

    let mut days = structured.value().as_array().cloned().unwrap_or_default();
    let mut changed = false;

    for item in days.iter_mut() {
        let Some(object) = item.as_object_mut() else {
            continue;
        };
        let no_data = object
            .get("weather")
            .and_then(Value::as_str)
            .map(|w| w.trim() == NO_WEATHER_INFO)
            .unwrap_or(false);
        let has_advice = object
            .get("recommendations")
            .and_then(Value::as_str)
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false);
        if no_data && !has_advice {
            let date = object.get("date").and_then(Value::as_str).unwrap_or_default();
            let advice = seasonal_advice(&destination, date);
            object.insert("recommendations".into(), Value::String(advice));
            changed = true;
        }
    }

    for date in &requested {
        let present = days
            .iter()
            .any(|d| d.get("date").and_then(Value::as_str) == Some(date.as_str()));
        if !present {
            tracing::debug!(%date, "model skipped a requested date; adding seasonal advice");
            days.push(serde_json::json!({
                "date": date,
                "weather": NO_WEATHER_INFO,
                "high": NO_WEATHER_INFO,
                "low": NO_WEATHER_INFO,
                "recommendations": seasonal_advice(&destination, date),
            }));
            changed = true;
        }
    }

    if !changed {
        return structured;
    }
    days.sort_by(|a, b| {
        let key = |v: &Value| v.get("date").and_then(Value::as_str).unwrap_or_default().to_string();
        key(a).cmp(&key(b))
    });
    StructuredResult::from_value(Value::Array(days))
}

/// `34` → `34°C`; values that already carry a unit are left alone
fn celsius(value: &str) -> String {
    let value = value.trim();
    if value.ends_with("°C") || value.ends_with('℃') || value.parse::<f64>().is_err() {
        value.to_string()
    } else {
        format!("{value}°C")
    }
}

pub struct WeatherSkill {
    spec: AgentSpec,
    gateway: ModelGateway,
    tools: ToolBox,
}

impl WeatherSkill {
    /// Weather agent backed by the QWeather lookup and forecast tools
    pub fn new(gateway: ModelGateway, client: Arc<QWeatherClient>) -> Self {
        let tools = ToolBox::new()
            .with_tool(Arc::new(LocationLookupTool::new(client.clone())))
            .with_tool(Arc::new(ForecastTool::new(client)));
        Self::with_tools(gateway, tools)
    }

    pub fn with_tools(gateway: ModelGateway, tools: ToolBox) -> Self {
        Self {
            spec: AgentSpec::for_kind(AgentKind::Weather),
            gateway,
            tools,
        }
    }
}

#[async_trait]
impl ExpertAgent for WeatherSkill {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    #[tracing::instrument(skip_all, fields(agent = "WeatherAgent"))]
    async fn produce_structured(
        &self,
        query: &str,
        ctx: &RunContext,
    ) -> Result<StructuredResult, OrchestrationError> {
        ctx.record(Record::agent(self.spec.name, "开始获取天气信息...").with_text(query));

        let structured = run_expert(&self.gateway, &self.spec, query, &self.tools, ctx).await?;
        let structured = fill_missing_days(structured, query);

        ctx.record(Record::agent(self.spec.name, "获取天气信息完成").with_json(structured.raw()));
        Ok(structured)
    }

    fn render_text(&self, structured: &StructuredResult) -> Result<String, RenderError> {
        let days: Vec<WeatherDay> = decode_days(structured)?;

        let mut blocks = Vec::with_capacity(days.len());
        for day in &days {
            let date = required(&day.date, "date")?;
            let advice = day.recommendations.trim();
            let block = if day.has_forecast() {
                format!(
                    "**{date}：**\n🌤️ 天气：{}\n🌡️ 温度：{} - {}\n💡 天气建议：{advice}",
                    day.weather.trim(),
                    celsius(&day.high),
                    celsius(&day.low),
                )
            } else {
                format!("**{date}：**\n💡 天气建议：{advice}")
            };
            blocks.push(block);
        }

        Ok(format!("用户旅行期间的天气信息与建议:\n{}", blocks.join("\n\n")))
    }
}
