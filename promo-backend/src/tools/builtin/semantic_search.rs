//! Semantic Search Tool
//!
//! Embeds the question, pulls the nearest promotion rows from the vector
//! index (honoring a quarter filter parsed from the question) and asks the
//! model to interpret them.

use crate::ai::{ChatModel, Embedder, Message};
use crate::errors::PromoError;
use crate::routing::parse_filters;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolContext, ToolDefinition, ToolKind, ToolResult};
use crate::tools::QuestionParams;
use crate::vector::{ScoredDocument, VectorIndex};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const DESCRIPTION: &str = "Use this tool to find promotions similar to a description, pattern or fuzzy \
criterion, e.g. \"promotions similar to high-performing campaigns\", \"promotions in North with \
high uplift\", \"promotions with Green RAG status in Q3\". Input is the user's natural language question.";

pub const NO_RESULTS: &str = "No relevant results found for your query.";

pub struct SemanticSearchTool {
    definition: ToolDefinition,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl SemanticSearchTool {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            definition: ToolDefinition::question_tool(ToolKind::SemanticSearch, DESCRIPTION),
            index,
            embedder,
            model,
            top_k: top_k.max(1),
        }
    }

    async fn search(&self, question: &str) -> Result<String, PromoError> {
        let filters = parse_filters(question);
        if !filters.is_empty() {
            log::info!("[RAG_TOOL] Applying filters: {:?}", filters);
        }

        let query_vector = self.embedder.embed_query(question).await?;
        let results = self.index.search_filtered(&query_vector, self.top_k, &filters);
        log::info!("[RAG_TOOL] Retrieved {} documents", results.len());

        if results.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }

        let prompt = format!(
            "You are an expert promotions analyst. Use the search results below to answer the question.\n\n\
             QUESTION: {}\n\n\
             SEARCH RESULTS:\n{}\n\n\
             Give a direct answer, the patterns you see, and specific promotions worth noting. \
             ROI%_PromoID is the actual ROI. Present figures as key: value lines, not tables.\n\nANALYSIS:",
            question,
            format_results(&results)
        );
        Ok(self.model.generate_text(vec![Message::user(prompt)]).await?)
    }
}

pub fn format_results(results: &[ScoredDocument]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "--- Result {} ---\n{}\nMetadata: {}",
                i + 1,
                r.document.content,
                r.document.metadata_line()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params = match QuestionParams::parse(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };
        context.record_usage(ToolKind::SemanticSearch);
        log::info!("[RAG_TOOL] Invoked");

        match self.search(&params.question).await {
            Ok(answer) => ToolResult::success(answer),
            Err(e) => {
                log::error!("[RAG_TOOL] Search failed: {}", e);
                ToolResult::error(format!("Error during semantic search: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::ScriptedModel;
    use crate::vector::index::tests::KeywordEmbedder;
    use crate::vector::{Metadata, VectorDocument};
    use serde_json::json;

    async fn index(embedder: &KeywordEmbedder) -> Arc<VectorIndex> {
        let docs = vec![
            VectorDocument {
                content: "Region: North | ROI%: 12".to_string(),
                metadata: Metadata::from([("Quarter".to_string(), json!("Q3"))]),
            },
            VectorDocument {
                content: "Region: South | ROI%: 4".to_string(),
                metadata: Metadata::from([("Quarter".to_string(), json!("Q1"))]),
            },
        ];
        Arc::new(VectorIndex::build(docs, embedder, 10).await.unwrap())
    }

    #[tokio::test]
    async fn test_narrates_results() {
        let embedder = KeywordEmbedder::new();
        let index = index(&embedder).await;
        let model = Arc::new(ScriptedModel::texts(vec!["North stands out."]));
        let tool = SemanticSearchTool::new(index, Arc::new(KeywordEmbedder::new()), model.clone(), 10);

        let result = tool.execute(json!({"question": "north promotions in q3"}), &ToolContext::default()).await;
        assert!(result.success);
        assert_eq!(result.content, "North stands out.");

        let prompt = model.prompts().pop().unwrap();
        assert!(prompt.contains("--- Result 1 ---\nRegion: North | ROI%: 12\nMetadata: Quarter=Q3"));
        assert!(!prompt.contains("South"));
    }

    #[tokio::test]
    async fn test_no_results_message() {
        let embedder = KeywordEmbedder::new();
        let index = index(&embedder).await;
        let model = Arc::new(ScriptedModel::texts(vec![]));
        let tool = SemanticSearchTool::new(index, Arc::new(KeywordEmbedder::new()), model, 10);

        let result = tool.execute(json!({"question": "anything in q2"}), &ToolContext::default()).await;
        assert_eq!(result.content, NO_RESULTS);
    }
}
