//! Descriptive statistics for the simple prediction path.

use crate::data::{CellValue, ColumnKind, PromotionTable};
use crate::ml::scenario::Scenario;

/// Name fragments that mark a metric column worth summarizing
const METRIC_MARKERS: [&str; 3] = ["Uplift", "Sales", "ROI"];

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; undefined for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };

    let std = (count > 1).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        var.sqrt()
    });

    Some(Summary {
        count,
        mean,
        median,
        std,
        min: sorted[0],
        max: sorted[count - 1],
    })
}

/// Rows whose cells equal every scenario value (text compared case-insensitively)
pub fn filter_rows(table: &PromotionTable, scenario: &Scenario) -> Vec<usize> {
    let lookups: Vec<(usize, &CellValue)> = scenario
        .iter()
        .filter_map(|(column, value)| table.column_index(column).map(|idx| (idx, value)))
        .collect();

    (0..table.len())
        .filter(|&row| {
            lookups
                .iter()
                .all(|(idx, wanted)| cell_equals(&table.rows[row][*idx], wanted))
        })
        .collect()
}

fn cell_equals(cell: &CellValue, wanted: &CellValue) -> bool {
    match (cell, wanted) {
        (CellValue::Number(a), CellValue::Number(b)) => (a - b).abs() < 1e-9,
        (CellValue::Text(a), CellValue::Text(b)) => a.eq_ignore_ascii_case(b),
        (CellValue::Number(a), CellValue::Text(b)) | (CellValue::Text(b), CellValue::Number(a)) => {
            b.trim().parse::<f64>().map(|b| (a - b).abs() < 1e-9).unwrap_or(false)
        }
        _ => false,
    }
}

pub fn metric_columns(table: &PromotionTable) -> Vec<&str> {
    table
        .columns
        .iter()
        .filter(|c| c.kind == ColumnKind::Number)
        .filter(|c| METRIC_MARKERS.iter().any(|m| c.name.contains(m)))
        .map(|c| c.name.as_str())
        .collect()
}

/// Text block of per-metric statistics over the selected rows
pub fn statistical_summary(table: &PromotionTable, rows: &[usize]) -> String {
    let mut out = format!("Matching promotions: {}\n", rows.len());
    for column in metric_columns(table) {
        let Some(idx) = table.column_index(column) else {
            continue;
        };
        let values: Vec<f64> = rows.iter().filter_map(|&r| table.rows[r][idx].as_f64()).collect();
        let Some(s) = summarize(&values) else {
            continue;
        };
        let std = s.std.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!(
            "{}: count={}, mean={:.2}, median={:.2}, std={}, min={:.2}, max={:.2}\n",
            column, s.count, s.mean, s.median, std, s.min, s.max
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_from_reader;

    #[test]
    fn test_summarize() {
        let s = summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.count, 8);
        assert!((s.mean - 5.0).abs() < 1e-9);
        assert!((s.median - 4.5).abs() < 1e-9);
        assert!((s.std.unwrap() - 2.138089935).abs() < 1e-6);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);

        let single = summarize(&[3.0]).unwrap();
        assert_eq!(single.std, None);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_filter_and_summary() {
        let table = load_from_reader(
            "Region,Discount,ROI%,Sales_Value,Notes\nNorth,10,5,100,a\nnorth,20,15,300,b\nSouth,10,1,50,c\n".as_bytes(),
        )
        .unwrap();

        let mut scenario = Scenario::new();
        scenario.insert("Region".to_string(), CellValue::Text("NORTH".to_string()));
        let rows = filter_rows(&table, &scenario);
        assert_eq!(rows, vec![0, 1]);

        assert_eq!(metric_columns(&table), vec!["ROI%", "Sales_Value"]);
        let text = statistical_summary(&table, &rows);
        assert!(text.starts_with("Matching promotions: 2\n"));
        assert!(text.contains("ROI%: count=2, mean=10.00, median=10.00, std=7.07, min=5.00, max=15.00"));

        scenario.insert("Discount".to_string(), CellValue::Number(10.0));
        assert_eq!(filter_rows(&table, &scenario), vec![0]);
    }
}
