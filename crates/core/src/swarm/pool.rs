//! Append-only output pool shared by the steps of one dynamic run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Producer name of the seeded entry
pub const USER_PRODUCER: &str = "user";

/// One producer's rendered and structured output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPoolEntry {
    pub producer: String,
    pub text: String,
    /// `Null` for the user's query
    pub json: Value,
}

/// Ordered record of every output in a run; entries are never removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPool {
    entries: Vec<OutputPoolEntry>,
}

impl OutputPool {
    /// Pool seeded with the user's query
    pub fn seeded(query: &str) -> Self {
        Self {
            entries: vec![OutputPoolEntry {
                producer: USER_PRODUCER.to_string(),
                text: query.to_string(),
                json: Value::Null,
            }],
        }
    }

    pub fn push(&mut self, producer: &str, text: String, json: Value) {
        self.entries.push(OutputPoolEntry {
            producer: producer.to_string(),
            text,
            json,
        });
    }

    pub fn entries(&self) -> &[OutputPoolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Numbered listing used in the gatekeeper prompt
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let json = match &entry.json {
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                format!(
                    "{}. **来源**: {}\n   **文本内容**: {}\n   **JSON内容**: {}",
                    i + 1,
                    entry.producer,
                    entry.text,
                    json
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_and_append_only() {
        let mut pool = OutputPool::seeded("去北京3天");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.entries()[0].producer, USER_PRODUCER);

        pool.push("AnalyzerAgent", "分析".into(), serde_json::json!({"destination": "北京"}));
        pool.push("WeatherAgent", "天气".into(), serde_json::json!([]));

        let producers: Vec<_> = pool.entries().iter().map(|e| e.producer.as_str()).collect();
        assert_eq!(producers, vec!["user", "AnalyzerAgent", "WeatherAgent"]);
    }

    #[test]
    fn test_describe() {
        let mut pool = OutputPool::seeded("去北京");
        pool.push("AnalyzerAgent", "分析".into(), serde_json::json!({"destination": "北京"}));

        let listing = pool.describe();
        assert!(listing.starts_with("1. **来源**: user"));
        assert!(listing.contains("2. **来源**: AnalyzerAgent"));
        assert!(listing.contains(r#"{"destination":"北京"}"#));
    }
}
