//! Current date tool.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde_json::Value;

use super::{empty_parameters, Tool, ToolError};

/// `get_current_date`: today's date as `YYYY-MM-DD`
#[derive(Debug, Clone, Default)]
pub struct CurrentDateTool {
    fixed: Option<NaiveDate>,
}

impl CurrentDateTool {
    /// Reads the local system clock on every call
    pub fn system() -> Self {
        Self { fixed: None }
    }

    /// Always answers with `date`
    pub fn fixed(date: NaiveDate) -> Self {
        Self { fixed: Some(date) }
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[async_trait]
impl Tool for CurrentDateTool {
    fn name(&self) -> &'static str {
        "get_current_date"
    }

    fn description(&self) -> &'static str {
        "用于获取当前日期, 返回格式为`当前日期是'YYYY-MM-DD'`"
    }

    fn parameters(&self) -> Value {
        empty_parameters()
    }

    fn label(&self) -> &'static str {
        "获取当前日期"
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(Value::String(self.today().format("%Y-%m-%d").to_string()))
    }

    fn observation(&self, output: &Value) -> String {
        format!("当前日期是{}", output.as_str().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_date() {
        let tool = CurrentDateTool::fixed(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap());
        let output = tool.execute(Value::Null).await.unwrap();

        assert_eq!(output, "2025-09-30");
        assert_eq!(tool.observation(&output), "当前日期是2025-09-30");
    }

    #[tokio::test]
    async fn test_system_date_format() {
        let output = CurrentDateTool::system().execute(Value::Null).await.unwrap();
        let text = output.as_str().unwrap();
        assert!(NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok());
    }
}
