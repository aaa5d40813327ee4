use crate::ai::{AiError, ChatModel, Message, ToolHistoryEntry, ToolResponse};
use crate::execution::{ExecutionTracker, ToolUsage};
use crate::tools::{ToolContext, ToolKind, ToolRegistry};
use promo_types::StreamEvent;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Final answer plus the tools that produced it
#[derive(Debug, Clone)]
pub struct AgentAnswer {
    pub answer: String,
    pub usage: ToolUsage,
}

/// Routes questions to the analytics tools through the model's native tool calling
pub struct PromotionAgent {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    tracker: Arc<ExecutionTracker>,
    system_prompt: String,
    max_iterations: usize,
}

impl PromotionAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        tracker: Arc<ExecutionTracker>,
        system_prompt: String,
        max_iterations: usize,
    ) -> Self {
        Self {
            model,
            registry,
            tracker,
            system_prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answer a question. Failures become the answer text rather than an error.
    pub async fn query(&self, question: &str) -> AgentAnswer {
        let execution_id = self.tracker.start_execution();
        let result = self.run(question, &execution_id, None).await;
        let usage = self.tracker.finish_execution(&execution_id);

        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("[AGENT] Query failed: {}", e);
                format!("Error: Agent execution error: {}", e)
            }
        };
        log::info!("[AGENT] Tool usage: {:?}", usage.counts());
        AgentAnswer { answer, usage }
    }

    /// Answer a question, pushing status/content/done/error events to `sink`.
    ///
    /// A closed sink (client went away) is ignored; the query still finishes.
    pub async fn query_stream(&self, question: &str, sink: mpsc::Sender<StreamEvent>) -> AgentAnswer {
        let execution_id = self.tracker.start_execution();
        let result = self.run(question, &execution_id, Some(&sink)).await;
        let usage = self.tracker.finish_execution(&execution_id);

        let answer = match result {
            Ok(answer) => {
                let _ = sink.send(StreamEvent::content(answer.clone())).await;
                let _ = sink.send(StreamEvent::done(answer.clone())).await;
                answer
            }
            Err(e) => {
                log::error!("[AGENT] Streaming query failed: {}", e);
                let message = format!("Agent execution error: {}", e);
                let _ = sink.send(StreamEvent::error(message.clone())).await;
                format!("Error: {}", message)
            }
        };
        AgentAnswer { answer, usage }
    }

    async fn run(
        &self,
        question: &str,
        execution_id: &str,
        sink: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<String, AiError> {
        let messages = vec![Message::system(self.system_prompt.clone()), Message::user(question)];
        let tools = self.registry.definitions();
        let context = ToolContext::new(execution_id, Arc::clone(&self.tracker));

        log::info!(
            "[AGENT] Available tools ({}): {:?}",
            tools.len(),
            tools.iter().map(|t| &t.name).collect::<Vec<_>>()
        );

        let mut tool_history: Vec<ToolHistoryEntry> = Vec::new();
        let mut last_text = String::new();

        for iteration in 1..=self.max_iterations {
            log::info!("[AGENT] Iteration {} starting", iteration);
            let response = self
                .model
                .generate_with_tools(messages.clone(), &tool_history, &tools)
                .await?;

            if !response.content.trim().is_empty() {
                last_text = response.content.clone();
            }

            if !response.has_tool_calls() {
                if response.content.trim().is_empty() {
                    return Err(AiError::new("model returned an empty response"));
                }
                return Ok(response.content);
            }

            let mut tool_responses = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                log::info!("[AGENT] Tool call: {} with params: {}", call.name, call.arguments);

                if let (Some(sink), Ok(kind)) = (sink, ToolKind::from_str(&call.name)) {
                    let _ = sink.send(StreamEvent::status(kind.status_message())).await;
                }

                let result = self
                    .registry
                    .execute(&call.name, call.arguments.clone(), &context)
                    .await;
                log::info!("[AGENT] Tool {} success: {}", call.name, result.success);
                log::debug!("[AGENT] Tool {} content: {}", call.name, result.content);

                tool_responses.push(if result.success {
                    ToolResponse::success(call.id.clone(), result.content)
                } else {
                    ToolResponse::error(call.id.clone(), result.content)
                });
            }
            tool_history.push(ToolHistoryEntry::new(response.tool_calls, tool_responses));
        }

        log::warn!("[AGENT] Tool loop exceeded max iterations ({})", self.max_iterations);
        if last_text.trim().is_empty() {
            Err(AiError::new(format!(
                "no final answer after {} iterations",
                self.max_iterations
            )))
        } else {
            Ok(last_text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::{ScriptedModel, tool_call};
    use crate::ai::AiResponse;
    use crate::tools::{Tool, ToolDefinition, ToolResult};
    use async_trait::async_trait;
    use serde_json::Value;

    struct EchoTool(ToolKind);

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::question_tool(self.0, "echo")
        }

        async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
            context.record_usage(self.0);
            ToolResult::success(format!("{} saw {}", self.0, params["question"]))
        }
    }

    fn agent(model: Arc<ScriptedModel>, max_iterations: usize) -> PromotionAgent {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool(ToolKind::SqlQuery)));
        registry.register(Arc::new(EchoTool(ToolKind::MlPrediction)));
        PromotionAgent::new(
            model,
            registry,
            Arc::new(ExecutionTracker::new()),
            "system".to_string(),
            max_iterations,
        )
    }

    #[tokio::test]
    async fn test_dispatches_tool_then_answers() {
        let model = Arc::new(ScriptedModel::responses(vec![
            AiResponse::with_tools(String::new(), vec![tool_call("c1", "sql_query", "total sales")]),
            AiResponse::text("Total sales: 100".to_string()),
        ]));
        let answer = agent(model.clone(), 10).query("total sales?").await;

        assert_eq!(answer.answer, "Total sales: 100");
        assert_eq!(answer.usage.counts()["sql_query"], 1);
        // Second call replays one round of tool history with the tool output
        let history = model.histories();
        assert_eq!(history, vec![0, 1]);
        let last = model.last_history().unwrap();
        assert_eq!(last[0].tool_responses[0].content, "sql_query saw \"total sales\"");
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_back_error() {
        let model = Arc::new(ScriptedModel::responses(vec![
            AiResponse::with_tools(String::new(), vec![tool_call("c1", "web_fetch", "x")]),
            AiResponse::text("Sorry.".to_string()),
        ]));
        let answer = agent(model.clone(), 10).query("x").await;
        assert_eq!(answer.answer, "Sorry.");
        let last = model.last_history().unwrap();
        assert!(last[0].tool_responses[0].is_error);
        assert!(last[0].tool_responses[0].content.contains("not found"));
    }

    #[tokio::test]
    async fn test_iteration_bound() {
        let looping: Vec<AiResponse> = (0..5)
            .map(|i| AiResponse::with_tools(String::new(), vec![tool_call(&format!("c{}", i), "sql_query", "q")]))
            .collect();
        let model = Arc::new(ScriptedModel::responses(looping));
        let answer = agent(model.clone(), 3).query("loop forever").await;

        assert!(answer.answer.starts_with("Error: Agent execution error:"));
        assert_eq!(model.histories().len(), 3);
        assert_eq!(answer.usage.calls.len(), 3);
    }

    #[tokio::test]
    async fn test_iteration_bound_returns_last_text() {
        let looping: Vec<AiResponse> = (0..3)
            .map(|i| AiResponse::with_tools(format!("thinking {}", i), vec![tool_call("c", "sql_query", "q")]))
            .collect();
        let model = Arc::new(ScriptedModel::responses(looping));
        let answer = agent(model, 2).query("q").await;
        assert_eq!(answer.answer, "thinking 1");
    }

    #[tokio::test]
    async fn test_model_error_becomes_answer_text() {
        let model = Arc::new(ScriptedModel::responses(vec![]));
        let answer = agent(model, 10).query("q").await;
        assert!(answer.answer.starts_with("Error: Agent execution error:"));
    }

    #[tokio::test]
    async fn test_stream_event_order() {
        let model = Arc::new(ScriptedModel::responses(vec![
            AiResponse::with_tools(String::new(), vec![tool_call("c1", "ml_prediction", "predict ROI")]),
            AiResponse::text("ROI: 12%".to_string()),
        ]));
        let (tx, mut rx) = mpsc::channel(16);
        agent(model, 10).query_stream("predict ROI", tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::status(ToolKind::MlPrediction.status_message()),
                StreamEvent::content("ROI: 12%"),
                StreamEvent::done("ROI: 12%"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_event() {
        let model = Arc::new(ScriptedModel::responses(vec![]));
        let (tx, mut rx) = mpsc::channel(16);
        agent(model, 10).query_stream("q", tx).await;
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::Error { .. }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_client_does_not_fail_query() {
        let model = Arc::new(ScriptedModel::responses(vec![AiResponse::text("done".to_string())]));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let answer = agent(model, 10).query_stream("q", tx).await;
        assert_eq!(answer.answer, "done");
    }

    #[tokio::test]
    async fn test_concurrent_queries_have_isolated_usage() {
        let sql_model = Arc::new(ScriptedModel::responses(vec![
            AiResponse::with_tools(String::new(), vec![tool_call("a", "sql_query", "q")]),
            AiResponse::text("a".to_string()),
        ]));
        let ml_model = Arc::new(ScriptedModel::responses(vec![
            AiResponse::with_tools(String::new(), vec![tool_call("b", "ml_prediction", "q")]),
            AiResponse::text("b".to_string()),
        ]));

        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool(ToolKind::SqlQuery)));
        registry.register(Arc::new(EchoTool(ToolKind::MlPrediction)));
        let tracker = Arc::new(ExecutionTracker::new());
        let a = PromotionAgent::new(sql_model, registry.clone(), tracker.clone(), String::new(), 10);
        let b = PromotionAgent::new(ml_model, registry, tracker.clone(), String::new(), 10);

        let (ra, rb) = tokio::join!(a.query("q"), b.query("q"));
        assert_eq!(ra.usage.calls, vec![ToolKind::SqlQuery]);
        assert_eq!(rb.usage.calls, vec![ToolKind::MlPrediction]);
        assert_eq!(tracker.active_count(), 0);
    }
}
