//! Keyword rules that steer the prediction tool.

use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PredictionMode {
    /// Statistical summary of matching history, narrated by the model
    Simple,
    /// Train a regression model on the table and score the scenario
    Complex,
}

/// Ordered rule table; first rule with a matching keyword wins
const MODE_RULES: &[(&[&str], PredictionMode)] = &[
    (
        &["predict", "forecast", "what would", "what will", "expected"],
        PredictionMode::Complex,
    ),
    (
        &[
            "average",
            "mean",
            "typical",
            "usual",
            "normal",
            "similar to",
            "like",
            "comparable",
            "historical",
        ],
        PredictionMode::Simple,
    ),
];

const DEFAULT_MODE: PredictionMode = PredictionMode::Simple;

/// Keyword groups in priority order with the columns each one points at
const TARGET_RULES: &[(&[&str], &[&str])] = &[
    (
        &["value uplift", "value_uplift"],
        &[
            "Actual_Promo_Sales_Value_Uplift_%",
            "Planned_Promo_Sales_Value_Uplift_%",
            "Actual_Promo_Sales_Value_Uplift_PromoID_%",
        ],
    ),
    (
        &["volume uplift", "volume_uplift"],
        &["Actual_Promo_Sales_Volume_Uplift", "Planned_Promo_Sales_Volume_Uplift"],
    ),
    (&["roi"], &["ROI%", "ROI%_PromoID", "Planned_ROI%"]),
    (&["gross profit", "profit"], &["Gross_Profit", "Planned_Gross_Profit"]),
    (&["sales"], &["Predicted_Sales", "Sales_Value", "Actual_Sales_Value"]),
];

const FALLBACK_TARGETS: &[&str] = &[
    "Actual_Promo_Sales_Value_Uplift_%",
    "Actual_Promo_Sales_Volume_Uplift",
    "ROI%",
    "Predicted_Sales",
];

pub fn classify(question: &str) -> PredictionMode {
    let question = question.to_lowercase();
    MODE_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| question.contains(*k)))
        .map(|(_, mode)| *mode)
        .unwrap_or(DEFAULT_MODE)
}

/// Pick the column to predict. `has_column` answers whether the loaded table has a column.
pub fn detect_target_variable(question: &str, has_column: impl Fn(&str) -> bool) -> Option<String> {
    let question = question.to_lowercase();

    let matched = TARGET_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| question.contains(*k)))
        .and_then(|(_, columns)| columns.iter().find(|c| has_column(**c)));

    matched
        .or_else(|| FALLBACK_TARGETS.iter().find(|c| has_column(**c)))
        .map(|c| c.to_string())
}
