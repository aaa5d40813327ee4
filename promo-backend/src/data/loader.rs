//! CSV → PromotionTable import.

use crate::data::table::{CellValue, Column, ColumnKind, PromotionTable};
use crate::errors::{PromoError, Result};
use std::io::Read;
use std::path::Path;

pub fn load_csv(path: &Path) -> Result<PromotionTable> {
    let file = std::fs::File::open(path)?;
    let table = load_from_reader(file)?;
    log::info!(
        "[LOADER] Loaded {} rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

/// Parse CSV text with a header row. Empty cells become `Null`; a column is
/// numeric when every non-empty value parses as a number.
pub fn load_from_reader<R: Read>(reader: R) -> Result<PromotionTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim_start_matches('\u{feff}').trim();
            if h.is_empty() { format!("column_{}", i + 1) } else { h.to_string() }
        })
        .collect();

    if headers.is_empty() {
        return Err(PromoError::EmptyDataset("CSV has no header row".to_string()));
    }

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        row.resize(headers.len(), String::new());
        raw_rows.push(row);
    }

    if raw_rows.is_empty() {
        return Err(PromoError::EmptyDataset("CSV has no data rows".to_string()));
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let numeric = raw_rows
                .iter()
                .map(|r| r[idx].as_str())
                .filter(|v| !v.is_empty())
                .all(|v| parse_number(v).is_some());
            let has_values = raw_rows.iter().any(|r| !r[idx].is_empty());
            let kind = if numeric && has_values { ColumnKind::Number } else { ColumnKind::Text };
            Column { name, kind }
        })
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|raw| {
            raw.into_iter()
                .zip(&columns)
                .map(|(value, column)| to_cell(value, column.kind))
                .collect()
        })
        .collect();

    Ok(PromotionTable { columns, rows })
}

fn to_cell(value: String, kind: ColumnKind) -> CellValue {
    if value.is_empty() {
        return CellValue::Null;
    }
    match kind {
        ColumnKind::Number => parse_number(&value).map(CellValue::Number).unwrap_or(CellValue::Null),
        ColumnKind::Text => CellValue::Text(value),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}
