pub mod analytics;
pub mod loader;
pub mod quarter;
pub mod table;

pub use analytics::{AnalyticsDb, QueryOutput};
pub use loader::load_csv;
pub use quarter::{Quarter, quarter_label, week_number};
pub use table::{CellValue, Column, ColumnKind, PromotionTable, QUARTER_COLUMN, WEEK_COLUMN};

/// Append the derived `Quarter` column, replacing any source column of that name
pub fn add_quarter_column(table: &mut PromotionTable) {
    if let Some(existing) = table
        .columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(QUARTER_COLUMN))
    {
        log::warn!("[LOADER] Replacing source '{}' column with derived quarters", table.columns[existing].name);
        table.columns.remove(existing);
        for row in &mut table.rows {
            row.remove(existing);
        }
    }

    let week_idx = table.column_index(WEEK_COLUMN);
    for row in &mut table.rows {
        let label = match week_idx {
            Some(idx) => quarter_label(&row[idx]),
            None => table::UNKNOWN_QUARTER.to_string(),
        };
        row.push(CellValue::Text(label));
    }
    table.columns.push(Column {
        name: QUARTER_COLUMN.to_string(),
        kind: ColumnKind::Text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_quarter_column() {
        let mut table = loader::load_from_reader("Week,quarter\n3,old\n60,old\n".as_bytes()).unwrap();
        add_quarter_column(&mut table);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[1].name, "Quarter");
        assert_eq!(table.cell(0, "Quarter"), Some(&CellValue::Text("Q1".to_string())));
        assert_eq!(table.cell(1, "Quarter"), Some(&CellValue::Text("Unknown".to_string())));
    }

    #[test]
    fn test_quarter_without_week_is_unknown() {
        let mut table = loader::load_from_reader("Region\nNorth\n".as_bytes()).unwrap();
        add_quarter_column(&mut table);
        assert_eq!(table.cell(0, "Quarter"), Some(&CellValue::Text("Unknown".to_string())));
    }
}
