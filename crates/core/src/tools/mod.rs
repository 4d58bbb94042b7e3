//! # Agent Tools
//!
//! Deterministic capabilities the expert agents advertise to the model.
//!
//! ## Modules
//!
//! - `date` - current date (resolves "明天", "国庆节" style expressions)
//! - `qweather` - location lookup and 30-day forecast over the QWeather API

pub mod date;
pub mod qweather;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::gateway::ToolSchema;

pub use date::CurrentDateTool;
pub use qweather::{
    match_forecast, DailyForecast, ForecastDay, ForecastTool, LocationLookupTool, QWeatherClient,
    QWeatherConfig, NO_WEATHER_INFO,
};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("tool misconfigured: {0}")]
    Configuration(String),
}

/// A function the model may call during an agent's conversation
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    /// Short progress description shown while the tool runs
    fn label(&self) -> &'static str;

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    /// Text fed back into the conversation for a successful execution
    fn observation(&self, output: &Value) -> String;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Parameters schema generated from an argument struct
pub fn parameters_for<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| empty_parameters());
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}

/// Schema for tools that take no arguments
pub fn empty_parameters() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Decode tool arguments into their typed form
pub fn decode_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Ordered set of tools advertised together
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_toolbox_lookup() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let tools = ToolBox::new().with_tool(Arc::new(CurrentDateTool::fixed(date)));

        assert_eq!(tools.len(), 1);
        assert!(tools.find("get_current_date").is_some());
        assert!(tools.find("get_location_id").is_none());

        let schemas = tools.schemas();
        assert_eq!(schemas[0].name, "get_current_date");
        assert_eq!(schemas[0].parameters["type"], "object");
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Args {
        /// Place name
        address: String,
    }

    #[test]
    fn test_generated_parameters() {
        let params = parameters_for::<Args>();
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["address"]["type"], "string");
        assert!(params.get("$schema").is_none());
        assert_eq!(params["required"][0], "address");
    }
}
