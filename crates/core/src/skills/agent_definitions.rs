//! # Agent Definitions
//!
//! The closed set of expert agents, their immutable specs and the lookup
//! table the coordinators resolve them through.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::swarm::{OrchestrationError, OrchestratorConfig};
use crate::tools::{CurrentDateTool, QWeatherClient};

use super::prompts;
use super::{AnalyzerSkill, ExpertAgent, PlannerSkill, WeatherSkill};

/// Every expert agent the system knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    #[serde(rename = "AnalyzerAgent")]
    Analyzer,
    #[serde(rename = "WeatherAgent")]
    Weather,
    #[serde(rename = "PlannerAgent")]
    Planner,
}

impl AgentKind {
    /// Canonical order: the static pipeline order
    pub const ALL: [AgentKind; 3] = [AgentKind::Analyzer, AgentKind::Weather, AgentKind::Planner];

    /// Name the planner and the gatekeeper use
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Analyzer => "AnalyzerAgent",
            AgentKind::Weather => "WeatherAgent",
            AgentKind::Planner => "PlannerAgent",
        }
    }

    /// Key in the per-agent model maps
    pub fn component_id(&self) -> &'static str {
        match self {
            AgentKind::Analyzer => "analyzer",
            AgentKind::Weather => "weather",
            AgentKind::Planner => "planner",
        }
    }

    /// Resolve a name produced by a model or a caller
    pub fn from_name(name: &str) -> Result<Self, OrchestrationError> {
        let wanted = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| {
                k.name().eq_ignore_ascii_case(wanted) || k.component_id().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| OrchestrationError::UnknownAgent(wanted.to_string()))
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const ANALYZER_DESCRIPTION: &str = "旅行信息分析归类专家, 擅长从用户输入中提取旅行相关信息";
const ANALYZER_INPUT_FORMAT: &str = "用户的原始输入文本, 其JSON Schema为:\n{\n  \"type\": \"string\",\n  \"description\": \"用户输入的文本\"\n}";
const ANALYZER_INPUT_EXAMPLE: &str = "2025年7月1日去北京3天，预算1200元，我喜欢自然风光, 最想去故宫";

const WEATHER_DESCRIPTION: &str = "天气信息收集与出行建议专家, 擅长根据天气情况为旅行者提供个性化、实用的出行建议";
const WEATHER_INPUT_FORMAT: &str = "包含旅行地点和旅行日期的文本, 其JSON Schema为:\n{\n  \"type\": \"string\",\n  \"description\": \"旅行地点和旅行日期用';'分隔, 多个旅行日期用','分隔\"\n}";
const WEATHER_INPUT_EXAMPLE: &str = "旅行地点: 九寨沟;旅行日期: 2025-07-01,2025-07-02";

const PLANNER_DESCRIPTION: &str = "资深旅行规划师, 擅长融合用户意图、天气、交通、当地风俗与美食, 生成一份拿来就能用的旅行执行手册";
const PLANNER_INPUT_FORMAT: &str = "包含'用户旅行意图分析结果'和'用户旅行期间的天气信息与建议'两部分的文本, 其JSON Schema为:\n{\n  \"type\": \"string\",\n  \"description\": \"'用户旅行意图分析结果'和'用户旅行期间的天气信息与建议'两方面信息\"\n}";
const PLANNER_INPUT_EXAMPLE: &str = "用户旅行意图分析结果:\n🏕️ **目的地**：九寨沟\n⏰ **旅行天数**：2天\n📅 **出发时间**：2025-07-01\n📅 **所有日期**：2025-07-01,2025-07-02\n🎯 **偏好类型**：观光\n💰 **预算范围**：3000\n👥 **出行人数**：1人\n\n用户旅行期间的天气信息与建议:\n**2025-07-01：**\n🌤️ 天气：阴\n🌡️ 温度：28°C - 18°C\n💡 天气建议：阴天适合户外游览, 建议穿轻便衣物。\n\n**2025-07-02：**\n🌤️ 天气：阵雨\n🌡️ 温度：28°C - 19°C\n💡 天气建议：有阵雨, 建议携带雨具, 穿防滑鞋。";

/// Immutable descriptor of one expert agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSpec {
    pub kind: AgentKind,
    pub name: &'static str,
    pub description: &'static str,
    pub input_format: &'static str,
    pub input_example: &'static str,
    /// Full role prompt, also shown to the planner
    pub system_prompt: String,
    /// Prefix of the text returned when rendering fails
    pub failure_label: &'static str,
}

impl AgentSpec {
    pub fn for_kind(kind: AgentKind) -> Self {
        let (description, input_format, input_example, template, failure_label) = match kind {
            AgentKind::Analyzer => (
                ANALYZER_DESCRIPTION,
                ANALYZER_INPUT_FORMAT,
                ANALYZER_INPUT_EXAMPLE,
                prompts::ANALYZER,
                "需求组织失败",
            ),
            AgentKind::Weather => (
                WEATHER_DESCRIPTION,
                WEATHER_INPUT_FORMAT,
                WEATHER_INPUT_EXAMPLE,
                prompts::WEATHER,
                "天气信息收集失败",
            ),
            AgentKind::Planner => (
                PLANNER_DESCRIPTION,
                PLANNER_INPUT_FORMAT,
                PLANNER_INPUT_EXAMPLE,
                prompts::PLANNER,
                "行程规划处理失败",
            ),
        };

        let system_prompt = prompts::fill(
            template,
            &[
                ("description", description),
                ("input_format", input_format),
                ("input_example", input_example),
            ],
        );

        Self {
            kind,
            name: kind.name(),
            description,
            input_format,
            input_example,
            system_prompt,
            failure_label,
        }
    }
}

/// Lookup table from agent kind to implementation, built once per process
#[derive(Clone)]
pub struct AgentRegistry {
    analyzer: Arc<dyn ExpertAgent>,
    weather: Arc<dyn ExpertAgent>,
    planner: Arc<dyn ExpertAgent>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    pub fn get(&self, kind: AgentKind) -> &Arc<dyn ExpertAgent> {
        match kind {
            AgentKind::Analyzer => &self.analyzer,
            AgentKind::Weather => &self.weather,
            AgentKind::Planner => &self.planner,
        }
    }

    /// Resolve an agent by name; unknown names are rejected
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn ExpertAgent>, OrchestrationError> {
        AgentKind::from_name(name).map(|kind| self.get(kind))
    }

    /// Specs in canonical order
    pub fn specs(&self) -> Vec<&AgentSpec> {
        AgentKind::ALL.iter().map(|k| self.get(*k).spec()).collect()
    }
}

#[derive(Default)]
pub struct AgentRegistryBuilder {
    analyzer: Option<Arc<dyn ExpertAgent>>,
    weather: Option<Arc<dyn ExpertAgent>>,
    planner: Option<Arc<dyn ExpertAgent>>,
}

impl AgentRegistryBuilder {
    /// Register an agent under its own kind, replacing any earlier one
    pub fn with_agent(mut self, agent: Arc<dyn ExpertAgent>) -> Self {
        match agent.kind() {
            AgentKind::Analyzer => self.analyzer = Some(agent),
            AgentKind::Weather => self.weather = Some(agent),
            AgentKind::Planner => self.planner = Some(agent),
        }
        self
    }

    pub fn build(self) -> Result<AgentRegistry, OrchestrationError> {
        Ok(AgentRegistry {
            analyzer: self
                .analyzer
                .ok_or(OrchestrationError::MissingAgent(AgentKind::Analyzer))?,
            weather: self
                .weather
                .ok_or(OrchestrationError::MissingAgent(AgentKind::Weather))?,
            planner: self
                .planner
                .ok_or(OrchestrationError::MissingAgent(AgentKind::Planner))?,
        })
    }
}

/// Production team: one HTTP gateway per agent, QWeather tools for weather
pub fn create_expert_team(config: &OrchestratorConfig) -> Result<AgentRegistry, OrchestrationError> {
    let gateway = |kind: AgentKind| {
        config
            .gateway_for(kind.component_id())
            .map_err(|e| OrchestrationError::gateway(kind.name(), e))
    };

    let qweather = QWeatherClient::new(&config.qweather).map_err(|e| OrchestrationError::InvalidState(e.to_string()))?;

    AgentRegistry::builder()
        .with_agent(Arc::new(AnalyzerSkill::new(
            gateway(AgentKind::Analyzer)?,
            CurrentDateTool::system(),
        )))
        .with_agent(Arc::new(WeatherSkill::new(
            gateway(AgentKind::Weather)?,
            Arc::new(qweather),
        )))
        .with_agent(Arc::new(PlannerSkill::new(gateway(AgentKind::Planner)?)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedBackend;
    use crate::gateway::ModelGateway;

    fn offline_gateway() -> ModelGateway {
        ModelGateway::new(Arc::new(ScriptedBackend::new()))
    }

    #[test]
    fn test_agent_names() {
        assert_eq!(AgentKind::from_name("WeatherAgent").unwrap(), AgentKind::Weather);
        assert_eq!(AgentKind::from_name(" planneragent ").unwrap(), AgentKind::Planner);
        assert_eq!(AgentKind::from_name("analyzer").unwrap(), AgentKind::Analyzer);

        let err = AgentKind::from_name("HotelAgent").unwrap_err();
        assert!(matches!(err, OrchestrationError::UnknownAgent(name) if name == "HotelAgent"));
    }

    #[test]
    fn test_agent_kind_serde_uses_canonical_names() {
        let json = serde_json::to_string(&AgentKind::Analyzer).unwrap();
        assert_eq!(json, "\"AnalyzerAgent\"");
    }

    #[test]
    fn test_spec_prompt_is_filled() {
        let spec = AgentSpec::for_kind(AgentKind::Weather);
        assert_eq!(spec.name, "WeatherAgent");
        assert!(spec.system_prompt.contains(WEATHER_DESCRIPTION));
        assert!(spec.system_prompt.contains(WEATHER_INPUT_EXAMPLE));
        assert!(!spec.system_prompt.contains("{input_format}"));
    }

    #[test]
    fn test_registry_requires_every_agent() {
        let err = AgentRegistry::builder()
            .with_agent(Arc::new(PlannerSkill::new(offline_gateway())))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OrchestrationError::MissingAgent(AgentKind::Analyzer)));
    }

    #[test]
    fn test_registry_resolution() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let registry = AgentRegistry::builder()
            .with_agent(Arc::new(AnalyzerSkill::new(
                offline_gateway(),
                CurrentDateTool::fixed(date),
            )))
            .with_agent(Arc::new(WeatherSkill::with_tools(
                offline_gateway(),
                crate::tools::ToolBox::new(),
            )))
            .with_agent(Arc::new(PlannerSkill::new(offline_gateway())))
            .build()
            .unwrap();

        assert_eq!(registry.resolve("PlannerAgent").unwrap().kind(), AgentKind::Planner);
        assert!(registry.resolve("TrafficAgent").is_err());

        let names: Vec<_> = registry.specs().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["AnalyzerAgent", "WeatherAgent", "PlannerAgent"]);
    }
}
