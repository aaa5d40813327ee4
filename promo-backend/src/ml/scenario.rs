use crate::data::{CellValue, ColumnKind, PromotionTable};
use std::collections::BTreeMap;

/// Column → value pairs describing the promotion the user asks about
pub type Scenario = BTreeMap<String, CellValue>;

/// Parse `key=value, key=value` model output into a scenario.
///
/// Keys are matched to table columns case-insensitively; unknown keys are
/// dropped. Values in numeric columns become numbers when they parse.
pub fn parse_scenario(text: &str, table: &PromotionTable) -> Scenario {
    let mut scenario = Scenario::new();
    for pair in text.split([',', '\n']) {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = strip_quotes(key);
        let value = strip_quotes(value);
        if value.is_empty() {
            continue;
        }
        let Some(column) = table.resolve_column(key) else {
            log::debug!("[ML_TOOL] Dropping unknown scenario key '{}'", key);
            continue;
        };
        let kind = table
            .columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.kind)
            .unwrap_or(ColumnKind::Text);

        let cell = match (kind, value.parse::<f64>()) {
            (ColumnKind::Number, Ok(n)) => CellValue::Number(n),
            _ => CellValue::Text(value.to_string()),
        };
        scenario.insert(column.to_string(), cell);
    }
    scenario
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim()
}

pub fn describe(scenario: &Scenario) -> String {
    if scenario.is_empty() {
        return "no specific conditions".to_string();
    }
    scenario
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
