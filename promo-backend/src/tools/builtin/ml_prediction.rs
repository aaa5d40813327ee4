//! ML Prediction Tool
//!
//! Answers what-if and forecast questions. Simple questions get a
//! statistical summary of matching history narrated by the model; complex
//! ones train a ridge regression on the whole table and score the scenario.

use crate::ai::{ChatModel, Message};
use crate::cache::AnswerCache;
use crate::data::PromotionTable;
use crate::errors::PromoError;
use crate::ml::{Scenario, TrainedModel, filter_rows, parse_scenario, statistical_summary};
use crate::ml::scenario::describe;
use crate::routing::{PredictionMode, classify, detect_target_variable};
use crate::tools::registry::Tool;
use crate::tools::types::{ToolContext, ToolDefinition, ToolKind, ToolResult};
use crate::tools::QuestionParams;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DESCRIPTION: &str = "Use this tool for predictions, forecasts and what-if scenarios, e.g. \
\"predict the value uplift for a 20% discount in North\", \"what ROI should we expect for customer X \
in Q3\", \"typical uplift for promotions like this\". Input is the user's natural language question.";

pub const NO_MATCHING_DATA: &str = "No data matching the specified criteria.";

pub struct MlPredictionTool {
    definition: ToolDefinition,
    table: Arc<PromotionTable>,
    model: Arc<dyn ChatModel>,
    cache: Option<Arc<AnswerCache>>,
    training_timeout: Duration,
}

impl MlPredictionTool {
    pub fn new(
        table: Arc<PromotionTable>,
        model: Arc<dyn ChatModel>,
        cache: Option<Arc<AnswerCache>>,
        training_timeout: Duration,
    ) -> Self {
        Self {
            definition: ToolDefinition::question_tool(ToolKind::MlPrediction, DESCRIPTION),
            table,
            model,
            cache,
            training_timeout,
        }
    }

    async fn extract_scenario(&self, question: &str) -> Result<Scenario, PromoError> {
        let columns: Vec<&str> = self.table.columns.iter().map(|c| c.name.as_str()).collect();
        let prompt = format!(
            "Extract the scenario parameters from this what-if question.\n\
             Known columns: {}\n\
             Reply only with comma-separated key=value pairs (for example Region=North, Customer=Acme). \
             Reply with NONE if there are no conditions.\n\n\
             QUESTION: {}\n\nPARAMETERS:",
            columns.join(", "),
            question
        );
        let raw = self.model.generate_text(vec![Message::user(prompt)]).await?;
        let scenario = parse_scenario(&raw, &self.table);
        log::info!("[ML_TOOL] Scenario: {}", describe(&scenario));
        Ok(scenario)
    }

    async fn statistical_prediction(&self, question: &str, scenario: &Scenario) -> Result<String, PromoError> {
        let rows = filter_rows(&self.table, scenario);
        if rows.is_empty() {
            return Ok(NO_MATCHING_DATA.to_string());
        }
        let summary = statistical_summary(&self.table, &rows);

        let prompt = format!(
            "You are an expert data scientist answering a prediction question from historical promotions.\n\n\
             QUESTION: {}\n\nCONDITIONS: {}\n\nDATA SUMMARY:\n{}\n\
             ROI%_PromoID is the actual ROI; use it rather than ROI% when discussing ROI.\n\
             Provide a direct answer, the statistical reasoning, your confidence with caveats, \
             and specific recommendations.\n\nANALYSIS:",
            question,
            describe(scenario),
            summary
        );
        let narration = self.model.generate_text(vec![Message::user(prompt)]).await?;
        Ok(format!("{}\n\nDATA SUMMARY:\n{}", narration.trim_end(), summary.trim_end()))
    }

    async fn model_prediction(&self, target: &str, scenario: &Scenario) -> Result<String, PromoError> {
        let table = Arc::clone(&self.table);
        let target_owned = target.to_string();
        let started = Instant::now();

        let training = tokio::task::spawn_blocking(move || TrainedModel::train(&table, &target_owned));
        let trained = match tokio::time::timeout(self.training_timeout, training).await {
            Ok(joined) => joined??,
            Err(_) => {
                return Err(PromoError::Training(format!(
                    "training exceeded {}s",
                    self.training_timeout.as_secs()
                )));
            }
        };
        log::info!("[TIMING] Model training took {}ms", started.elapsed().as_millis());

        let prediction = trained.predict(scenario);
        let drivers = trained
            .top_features(5)
            .into_iter()
            .map(|(name, weight)| format!("- {} ({:+.3})", name, weight))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!(
            "ML PREDICTION RESULTS:\n\n\
             Model: ridge regression on standardized features\n\
             R² ({}): {:.4}\n\
             Training rows: {}\n\n\
             Scenario: {}\n\
             Predicted {}: {:.2}\n\n\
             Strongest drivers (standardized weights):\n{}\n\n\
             The model learned from {} historical promotions; the prediction reflects patterns \
             in similar promotions in the dataset.",
            if trained.holdout { "holdout" } else { "training" },
            trained.r2,
            trained.training_rows,
            describe(scenario),
            trained.target,
            prediction,
            drivers,
            trained.training_rows
        ))
    }

    async fn predict(&self, question: &str) -> Result<String, PromoError> {
        let mode = classify(question);
        let scenario = self.extract_scenario(question).await?;
        let target = detect_target_variable(question, |c| self.table.has_column(c));
        log::info!("[ML_TOOL] Mode: {}, target: {:?}", mode, target);

        match (mode, target) {
            (PredictionMode::Complex, Some(target)) => {
                match self.model_prediction(&target, &scenario).await {
                    Ok(answer) => Ok(answer),
                    Err(e) => {
                        log::warn!("[ML_TOOL] Model training failed ({}), falling back to statistics", e);
                        self.statistical_prediction(question, &scenario).await
                    }
                }
            }
            _ => self.statistical_prediction(question, &scenario).await,
        }
    }
}

#[async_trait]
impl Tool for MlPredictionTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params = match QuestionParams::parse(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };
        context.record_usage(ToolKind::MlPrediction);
        log::info!("[ML_TOOL] Invoked");

        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|c| c.get(ToolKind::MlPrediction, &params.question))
        {
            log::info!("[ML_TOOL] Cache hit");
            return ToolResult::success(cached);
        }

        match self.predict(&params.question).await {
            Ok(answer) => {
                if let Some(cache) = &self.cache {
                    cache.insert(ToolKind::MlPrediction, &params.question, answer.clone());
                }
                ToolResult::success(answer)
            }
            Err(e) => {
                log::error!("[ML_TOOL] Prediction failed: {}", e);
                ToolResult::error(format!("Error during ML prediction: {}", e))
            }
        }
    }
}
