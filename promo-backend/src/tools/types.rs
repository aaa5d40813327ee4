use crate::execution::ExecutionTracker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The analytics tools the agent can call
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    SqlQuery,
    SemanticSearch,
    MlPrediction,
}

impl ToolKind {
    /// Progress text pushed to streaming clients when the tool starts
    pub fn status_message(&self) -> &'static str {
        match self {
            ToolKind::SqlQuery => "Converting natural language to SQL...",
            ToolKind::SemanticSearch => "Semantic search in progress...",
            ToolKind::MlPrediction => {
                "Running appropriate algorithm and statistical analysis to perform the prediction..."
            }
        }
    }
}

/// JSON schema for a single tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            schema_type: "string".to_string(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }
}

/// Tool definition sent to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

impl ToolDefinition {
    /// Every analytics tool takes the user's question verbatim
    pub fn question_tool(kind: ToolKind, description: &str) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "question".to_string(),
            PropertySchema::string("The user's question, passed through unchanged."),
        );
        Self {
            name: kind.to_string(),
            description: description.to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec!["question".to_string()],
            },
        }
    }
}

/// Per-call context handed to tools
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Execution this call belongs to; usage is recorded against it
    pub execution_id: Option<String>,
    pub tracker: Option<Arc<ExecutionTracker>>,
}

impl ToolContext {
    pub fn new(execution_id: impl Into<String>, tracker: Arc<ExecutionTracker>) -> Self {
        Self {
            execution_id: Some(execution_id.into()),
            tracker: Some(tracker),
        }
    }

    pub fn record_usage(&self, kind: ToolKind) {
        if let (Some(id), Some(tracker)) = (&self.execution_id, &self.tracker) {
            tracker.record(id, kind);
        }
    }
}

/// Outcome of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            content: message.clone(),
            error: Some(message),
        }
    }
}
