//! Shared wire types for the promotion analytics API and its clients.

use serde::{Deserialize, Serialize};

// =====================================================
// Query Types
// =====================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Tools the agent invoked while answering, in call order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
}

/// Events sent over the streaming query endpoint.
///
/// Serialized with a `type` tag so the frontend can switch on
/// `status` / `content` / `done` / `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A tool started working on the question
    Status { message: String },
    /// Answer text
    Content { content: String },
    /// The answer is complete; carries the full text
    Done { content: String },
    /// The query failed
    Error { message: String },
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        StreamEvent::Content {
            content: content.into(),
        }
    }

    pub fn done(content: impl Into<String>) -> Self {
        StreamEvent::Done {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }
}

// =====================================================
// Admin Types
// =====================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl SyncResponse {
    pub fn success(message: impl Into<String>, file: Option<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            file,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
