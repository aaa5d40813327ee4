//! Tool-selecting agent over the analytics tools.

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{AgentAnswer, DEFAULT_MAX_ITERATIONS, PromotionAgent};
pub use prompt::build_system_prompt;

#[cfg(test)]
pub(crate) mod tests {
    use crate::ai::{AiError, AiResponse, ChatModel, Message, ToolCall, ToolHistoryEntry};
    use crate::tools::ToolDefinition;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Chat model that replays canned replies and records what it was asked
    #[derive(Default)]
    pub(crate) struct ScriptedModel {
        texts: Mutex<VecDeque<String>>,
        responses: Mutex<VecDeque<AiResponse>>,
        prompts: Mutex<Vec<String>>,
        histories: Mutex<Vec<Vec<ToolHistoryEntry>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(texts: Vec<&str>, responses: Vec<AiResponse>) -> Self {
            Self {
                texts: Mutex::new(texts.into_iter().map(String::from).collect()),
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        /// Replies for `generate_text`, in order
        pub(crate) fn texts(texts: Vec<&str>) -> Self {
            Self {
                texts: Mutex::new(texts.into_iter().map(String::from).collect()),
                ..Default::default()
            }
        }

        /// Replies for `generate_with_tools`, in order
        pub(crate) fn responses(responses: Vec<AiResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        /// Last user message of every `generate_text` call
        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }

        /// Tool history length seen by every `generate_with_tools` call
        pub(crate) fn histories(&self) -> Vec<usize> {
            self.histories.lock().iter().map(|h| h.len()).collect()
        }

        pub(crate) fn last_history(&self) -> Option<Vec<ToolHistoryEntry>> {
            self.histories.lock().last().cloned()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn generate_text(&self, messages: Vec<Message>) -> Result<String, AiError> {
            if let Some(last) = messages.last() {
                self.prompts.lock().push(last.content.clone());
            }
            self.texts
                .lock()
                .pop_front()
                .ok_or_else(|| AiError::new("scripted model has no more text replies"))
        }

        async fn generate_with_tools(
            &self,
            _messages: Vec<Message>,
            tool_history: &[ToolHistoryEntry],
            _tools: &[ToolDefinition],
        ) -> Result<AiResponse, AiError> {
            self.histories.lock().push(tool_history.to_vec());
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| AiError::with_status("scripted model has no more responses", 503))
        }
    }

    pub(crate) fn tool_call(id: &str, name: &str, question: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: serde_json::json!({ "question": question }),
        }
    }
}
