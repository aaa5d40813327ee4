pub mod builtin;
pub mod registry;
pub mod types;

pub use registry::{Tool, ToolRegistry};
pub use types::{PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolKind, ToolResult};

use serde::Deserialize;
use serde_json::Value;

/// Parameters shared by the analytics tools
#[derive(Debug, Deserialize)]
pub struct QuestionParams {
    pub question: String,
}

impl QuestionParams {
    /// Accepts `{"question": ...}` or a bare string, and rejects blank questions
    pub fn parse(params: Value) -> Result<Self, String> {
        let parsed = match params {
            Value::String(question) => QuestionParams { question },
            other => serde_json::from_value(other).map_err(|e| format!("Invalid parameters: {}", e))?,
        };
        if parsed.question.trim().is_empty() {
            return Err("Question cannot be empty".to_string());
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_params() {
        assert_eq!(QuestionParams::parse(json!({"question": "avg ROI"})).unwrap().question, "avg ROI");
        assert_eq!(QuestionParams::parse(json!("avg ROI")).unwrap().question, "avg ROI");
        assert!(QuestionParams::parse(json!({"question": "  "})).is_err());
        assert!(QuestionParams::parse(json!({"query": "x"})).is_err());
    }
}
