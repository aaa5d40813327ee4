//! SQL Query Tool
//!
//! Turns a question into a single SQLite SELECT over the analytical table,
//! runs it with retry, and returns the rows as an aligned text table.

use crate::ai::{ChatModel, Message};
use crate::data::AnalyticsDb;
use crate::errors::PromoError;
use crate::retry::RetryPolicy;
use crate::tools::registry::Tool;
use crate::tools::types::{ToolContext, ToolDefinition, ToolKind, ToolResult};
use crate::tools::QuestionParams;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

const DESCRIPTION: &str = "Use this tool for analytical questions that need calculations, aggregations, \
rankings or filtering by exact values, e.g. \"average value uplift by region\", \
\"top 10 promotions by volume uplift\", \"total sales in Q1\". \
Input is the user's natural language question.";

pub struct SqlQueryTool {
    definition: ToolDefinition,
    db: Arc<AnalyticsDb>,
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
    log_queries: bool,
}

impl SqlQueryTool {
    pub fn new(db: Arc<AnalyticsDb>, model: Arc<dyn ChatModel>, retry: RetryPolicy, log_queries: bool) -> Self {
        Self {
            definition: ToolDefinition::question_tool(ToolKind::SqlQuery, DESCRIPTION),
            db,
            model,
            retry,
            log_queries,
        }
    }

    fn sql_prompt(&self, question: &str) -> String {
        format!(
            "You write SQLite queries for a promotions analytics database.\n\n\
             SCHEMA:\n{}\n\
             RULES:\n\
             1. Reply with exactly one SQL statement and nothing else.\n\
             2. Only SELECT (or WITH ... SELECT) statements; never modify data.\n\
             3. Use the \"Quarter\" column (Q1-Q4) for quarter questions.\n\
             4. Use GROUP BY with every aggregate that needs it.\n\
             5. Round computed numbers to two decimals.\n\
             6. ROI%_PromoID is the actual ROI; prefer it over ROI% when computing ROI.\n\n\
             QUESTION: {}\n\nSQL:",
            self.db.schema_description(),
            question
        )
    }

    async fn generate_sql(&self, question: &str) -> Result<String, PromoError> {
        let raw = self
            .model
            .generate_text(vec![Message::user(self.sql_prompt(question))])
            .await?;
        let sql = strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(PromoError::InvalidQuery("model returned an empty query".to_string()));
        }
        Ok(sql)
    }

    async fn execute_sql(&self, sql: &str) -> Result<String, PromoError> {
        let started = Instant::now();
        let output = self
            .retry
            .run(
                "SQL_TOOL",
                || {
                    let db = Arc::clone(&self.db);
                    let sql = sql.to_string();
                    async move {
                        tokio::task::spawn_blocking(move || db.execute_select(&sql)).await?
                    }
                },
                |e: &PromoError| !matches!(e, PromoError::InvalidQuery(_)),
            )
            .await?;
        log::info!(
            "[TIMING] SQL execution took {}ms ({} rows)",
            started.elapsed().as_millis(),
            output.rows.len()
        );
        Ok(output.render())
    }
}

/// Remove markdown code fences (```sql ... ```) around generated SQL
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params = match QuestionParams::parse(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };
        context.record_usage(ToolKind::SqlQuery);
        log::info!("[SQL_TOOL] Invoked");

        let sql = match self.generate_sql(&params.question).await {
            Ok(sql) => sql,
            Err(e) => return ToolResult::error(format!("Error executing SQL query: {}", e)),
        };
        if self.log_queries {
            log::info!("[SQL_TOOL] Generated SQL:\n{}", sql);
        }

        match self.execute_sql(&sql).await {
            Ok(rendered) => {
                if self.log_queries {
                    log::info!("[SQL_TOOL] Result:\n{}", rendered);
                }
                ToolResult::success(rendered)
            }
            Err(e) => {
                log::error!("[SQL_TOOL] Query failed: {}", e);
                ToolResult::error(format!("Error executing SQL query: {}", e))
            }
        }
    }
}
