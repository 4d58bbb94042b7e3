//! Validated JSON output of an expert agent.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::json::extract_payload;
use crate::swarm::OrchestrationError;

/// JSON text an agent produced, guaranteed to parse
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResult {
    raw: String,
    value: Value,
}

impl StructuredResult {
    /// Validate a model reply; anything that is not JSON is a `Parse` error
    pub fn parse(producer: &str, reply: &str) -> Result<Self, OrchestrationError> {
        let payload = extract_payload(reply);
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| OrchestrationError::parse(producer, e))?;
        Ok(Self {
            raw: payload.to_string(),
            value,
        })
    }

    /// Result assembled in code rather than returned by the model
    pub fn from_value(value: Value) -> Self {
        Self {
            raw: value.to_string(),
            value,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Decode into an agent's artifact type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.raw, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_fence() {
        let result =
            StructuredResult::parse("AnalyzerAgent", "```json\n{\"destination\":\"北京\"}\n```")
                .unwrap();
        assert_eq!(result.raw(), "{\"destination\":\"北京\"}");
        assert_eq!(result.value()["destination"], "北京");
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = StructuredResult::parse("PlannerAgent", "抱歉，我无法规划这个行程").unwrap_err();
        match err {
            OrchestrationError::Parse { producer, .. } => assert_eq!(producer, "PlannerAgent"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_from_value() {
        let result = StructuredResult::from_value(serde_json::json!([1, 2]));
        assert_eq!(result.raw(), "[1,2]");
        let decoded: Vec<u8> = result.decode().unwrap();
        assert_eq!(decoded, vec![1, 2]);
    }
}
