//! # Progress Records
//!
//! UI-facing log entries emitted by the coordinators, the gatekeeper, the
//! agents and their tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Coordinator or planner
    Supervisor,
    /// Expert agent or gatekeeper
    Agent,
    /// Tool invocation
    Tool,
}

/// How `content` should be displayed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Json,
    Text,
    #[default]
    Empty,
}

/// One progress event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unique record ID
    pub id: String,
    /// Run this record belongs to (stamped by `RunContext`)
    #[serde(default)]
    pub run_id: Option<String>,
    /// Producer name (agent, tool or coordinator)
    pub name: String,
    pub kind: RecordKind,
    /// Short human-readable description ("开始分析...")
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_kind: ContentKind,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(kind: RecordKind, name: &str, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: None,
            name: name.to_string(),
            kind,
            description: description.into(),
            content: String::new(),
            content_kind: ContentKind::Empty,
            created_at: Utc::now(),
        }
    }

    pub fn supervisor(name: &str, description: impl Into<String>) -> Self {
        Self::new(RecordKind::Supervisor, name, description)
    }

    pub fn agent(name: &str, description: impl Into<String>) -> Self {
        Self::new(RecordKind::Agent, name, description)
    }

    pub fn tool(name: &str, description: impl Into<String>) -> Self {
        Self::new(RecordKind::Tool, name, description)
    }

    /// Attach plain text content
    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self.content_kind = ContentKind::Text;
        self
    }

    /// Attach JSON text content
    pub fn with_json(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self.content_kind = ContentKind::Json;
        self
    }

    /// Attach a JSON value, serialized
    pub fn with_value(self, value: &serde_json::Value) -> Self {
        self.with_json(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = Record::agent("AnalyzerAgent", "开始分析...").with_text("去北京");

        assert_eq!(record.name, "AnalyzerAgent");
        assert_eq!(record.kind, RecordKind::Agent);
        assert_eq!(record.content_kind, ContentKind::Text);
        assert!(record.run_id.is_none());

        let empty = Record::supervisor("StaticCoordinator", "需求分析任务完成");
        assert_eq!(empty.content_kind, ContentKind::Empty);
        assert_ne!(record.id, empty.id);
    }

    #[test]
    fn test_record_serialization() {
        let record = Record::tool("get_current_date", "获取当前日期...")
            .with_value(&serde_json::json!({}));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["kind"], "tool");
        assert_eq!(json["content_kind"], "json");
        assert_eq!(json["content"], "{}");
    }
}
