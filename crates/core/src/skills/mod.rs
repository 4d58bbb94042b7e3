//! # Expert Agents
//!
//! The three capability units the coordinators chain together.
//!
//! ## Architecture
//!
//! ```text
//! ExpertAgent (role prompt + input contract)
//!   ├── produce_structured ──▶ ModelGateway (+ ToolBox) ──▶ StructuredResult
//!   └── render             ──▶ human-readable text (never fails)
//! ```
//!
//! ## Agents
//!
//! - `AnalyzerSkill` - extracts destination, dates and budget from the request
//! - `WeatherSkill` - per-day forecast and advice (QWeather tools)
//! - `PlannerSkill` - day-by-day itinerary from analysis + weather text

pub mod llm_helpers;
pub mod prompts;
pub mod structured;

pub mod analyzer_skill;
pub mod planner_skill;
pub mod weather_skill;

// Agent Definitions (specs, registry, team factory)
pub mod agent_definitions;

use async_trait::async_trait;
use thiserror::Error;

use crate::swarm::{OrchestrationError, Record, RunContext};

pub use agent_definitions::{create_expert_team, AgentKind, AgentRegistry, AgentSpec};
pub use analyzer_skill::{expand_dates, AnalyzerSkill, TravelAnalysis};
pub use planner_skill::{DayItinerary, PlanSlot, PlannerSkill};
pub use structured::StructuredResult;
pub use weather_skill::{seasonal_advice, WeatherDay, WeatherSkill};

/// Why a structured result could not be turned into text
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("expected a non-empty array")]
    EmptyArray,
    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// One role-specific agent
#[async_trait]
pub trait ExpertAgent: Send + Sync {
    fn spec(&self) -> &AgentSpec;

    fn kind(&self) -> AgentKind {
        self.spec().kind
    }

    /// Ask the model for this agent's JSON artifact
    async fn produce_structured(
        &self,
        query: &str,
        ctx: &RunContext,
    ) -> Result<StructuredResult, OrchestrationError>;

    /// Pure rendering of a structured result
    fn render_text(&self, structured: &StructuredResult) -> Result<String, RenderError>;

    /// Render with progress records; failures become the agent's error text
    fn render(&self, structured: &StructuredResult, ctx: &RunContext) -> String {
        let spec = self.spec();
        ctx.record(Record::agent(spec.name, "开始格式化输出...").with_json(structured.raw()));

        match self.render_text(structured) {
            Ok(text) => {
                ctx.record(Record::agent(spec.name, "格式化输出完成").with_text(text.clone()));
                text
            }
            Err(e) => self.render_failure(e, ctx),
        }
    }

    /// Render JSON text that has not been validated yet
    fn render_str(&self, raw: &str, ctx: &RunContext) -> String {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => self.render(&StructuredResult::from_value(value), ctx),
            Err(e) => self.render_failure(RenderError::InvalidJson(e.to_string()), ctx),
        }
    }

    fn render_failure(&self, error: RenderError, ctx: &RunContext) -> String {
        let spec = self.spec();
        tracing::warn!(agent = spec.name, error = %error, "render failed");
        let message = format!("{}: {error}", spec.failure_label);
        ctx.record(Record::agent(spec.name, "格式化输出失败").with_text(message.clone()));
        message
    }
}

/// Text field that must be present and non-blank
pub(crate) fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, RenderError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RenderError::MissingField(field));
    }
    Ok(trimmed)
}

/// Non-empty array decoded into `T`
pub(crate) fn decode_days<T: serde::de::DeserializeOwned>(
    structured: &StructuredResult,
) -> Result<Vec<T>, RenderError> {
    match structured.value() {
        serde_json::Value::Array(items) if items.is_empty() => Err(RenderError::EmptyArray),
        serde_json::Value::Array(_) => structured
            .decode()
            .map_err(|e| RenderError::UnexpectedShape(e.to_string())),
        other => Err(RenderError::UnexpectedShape(format!(
            "expected an array, got {}",
            json_type(other)
        ))),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
