use crate::ai::types::{AiError, AiResponse, ToolCall, ToolHistoryEntry};
use crate::ai::{ChatModel, Embedder, Message};
use crate::config::Config;
use crate::retry::RetryPolicy;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

// Retry configuration for transient errors
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;

/// Client for OpenAI-compatible chat-completions and embeddings APIs
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    auth_headers: header::HeaderMap,
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIToolFunction,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAIToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// Arguments travel as a JSON-encoded string in this API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str, base_url: Option<&str>, model: Option<&str>) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?,
        );
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(Self {
            client: crate::http::shared_client().clone(),
            auth_headers,
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or("gpt-4o").to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            temperature: 0.0,
            retry: RetryPolicy::new(MAX_RETRIES + 1, Duration::from_millis(BASE_DELAY_MS)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, String> {
        let client = Self::new(
            &config.openai_api_key,
            Some(&config.openai_base_url),
            Some(&config.llm_model),
        )?;
        Ok(client
            .with_embedding_model(&config.embedding_model)
            .with_temperature(config.llm_temperature))
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// POST a JSON body, retrying transient failures with exponential backoff
    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, AiError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .retry
            .run("OPENAI", || self.send_once(&url, body), AiError::is_transient)
            .await?;

        response
            .json::<R>()
            .await
            .map_err(|e| AiError::new(format!("Failed to parse OpenAI response: {}", e)))
    }

    /// One request; non-success statuses become errors carrying the status code
    async fn send_once<B: Serialize>(&self, url: &str, body: &B) -> Result<reqwest::Response, AiError> {
        let response = self
            .client
            .post(url)
            .headers(self.auth_headers.clone())
            .timeout(Duration::from_secs(300))
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::new(format!("OpenAI API request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<OpenAIErrorResponse>(&error_text) {
            Ok(parsed) => parsed.error.message,
            Err(_) => error_text,
        };
        Err(AiError::with_status(
            format!("OpenAI API error: {}", message),
            status.as_u16(),
        ))
    }

    fn to_api_messages(messages: Vec<Message>) -> Vec<OpenAIMessage> {
        messages
            .into_iter()
            .map(|m| OpenAIMessage {
                role: m.role.to_string(),
                content: Some(m.content),
                tool_calls: None,
                tool_call_id: None,
            })
            .collect()
    }

    /// Build the assistant + tool messages that replay one round of tool calls
    pub fn build_tool_result_messages(entry: &ToolHistoryEntry) -> Vec<OpenAIMessage> {
        let mut messages = Vec::with_capacity(entry.tool_responses.len() + 1);

        let api_tool_calls: Vec<OpenAIToolCall> = entry
            .tool_calls
            .iter()
            .map(|tc| OpenAIToolCall {
                id: tc.id.clone(),
                call_type: function_type(),
                function: OpenAIFunctionCall {
                    name: tc.name.clone(),
                    arguments: tc.arguments.to_string(),
                },
            })
            .collect();

        messages.push(OpenAIMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(api_tool_calls),
            tool_call_id: None,
        });

        for response in &entry.tool_responses {
            messages.push(OpenAIMessage {
                role: "tool".to_string(),
                content: Some(response.content.clone()),
                tool_calls: None,
                tool_call_id: Some(response.tool_call_id.clone()),
            });
        }

        messages
    }

    fn parse_tool_calls(calls: Vec<OpenAIToolCall>) -> Vec<ToolCall> {
        calls
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    log::warn!(
                        "[OPENAI] Tool call '{}' had non-JSON arguments ({}), passing as string",
                        call.function.name,
                        e
                    );
                    Value::String(call.function.arguments.clone())
                });
                ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                }
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn generate_text(&self, messages: Vec<Message>) -> Result<String, AiError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: Self::to_api_messages(messages),
            temperature: self.temperature,
            tools: None,
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(AiError::new("OpenAI API returned no content"));
        }
        Ok(content)
    }

    async fn generate_with_tools(
        &self,
        messages: Vec<Message>,
        tool_history: &[ToolHistoryEntry],
        tools: &[ToolDefinition],
    ) -> Result<AiResponse, AiError> {
        let mut api_messages = Self::to_api_messages(messages);
        for entry in tool_history {
            api_messages.extend(Self::build_tool_result_messages(entry));
        }

        let api_tools: Vec<OpenAITool> = tools
            .iter()
            .map(|t| OpenAITool {
                tool_type: "function".to_string(),
                function: OpenAIToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: serde_json::to_value(&t.input_schema).unwrap_or_default(),
                },
            })
            .collect();

        let request = ChatRequest {
            model: self.model.clone(),
            messages: api_messages,
            temperature: self.temperature,
            tools: if api_tools.is_empty() { None } else { Some(api_tools) },
        };

        log::debug!(
            "[OPENAI] Tool request with {} messages, {} tools",
            request.messages.len(),
            tools.len()
        );

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::new("OpenAI API returned no choices"))?;

        let tool_calls = Self::parse_tool_calls(choice.message.tool_calls.unwrap_or_default());
        let stop_reason = if tool_calls.is_empty() {
            choice.finish_reason
        } else {
            Some("tool_calls".to_string())
        };

        Ok(AiResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            stop_reason,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(AiError::new(format!(
                "Embedding API returned {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AiError::new("Embedding API returned no vector"))
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
