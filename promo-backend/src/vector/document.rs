use crate::data::{PromotionTable, Quarter, WEEK_COLUMN, week_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, Value>;

const DATE_COLUMNS: [&str; 4] = ["Start_Prom", "End_Prom", "Start_Seas", "End_Seas"];
const CATEGORY_COLUMNS: [&str; 4] = ["Region", "Customer", "Product", "RAG_Status"];

/// One promotion row serialized for embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub content: String,
    pub metadata: Metadata,
}

impl VectorDocument {
    pub fn from_row(table: &PromotionTable, row: usize) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("row_index".to_string(), Value::from(row));

        for column in DATE_COLUMNS.iter().chain(CATEGORY_COLUMNS.iter()) {
            if let Some(cell) = table.cell(row, column).filter(|c| !c.is_null()) {
                metadata.insert(column.to_string(), Value::String(cell.to_string()));
            }
        }

        if let Some(week) = table.cell(row, WEEK_COLUMN).and_then(week_number) {
            metadata.insert(WEEK_COLUMN.to_string(), Value::from(week));
            if let Some(quarter) = Quarter::from_week(week) {
                metadata.insert("Quarter".to_string(), Value::String(quarter.to_string()));
            }
        }

        Self {
            content: table.row_text(row),
            metadata,
        }
    }

    /// `k=v` pairs for result formatting
    pub fn metadata_line(&self) -> String {
        self.metadata
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn build_documents(table: &PromotionTable) -> Vec<VectorDocument> {
    (0..table.len()).map(|row| VectorDocument::from_row(table, row)).collect()
}
