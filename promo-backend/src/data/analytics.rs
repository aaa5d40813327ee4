//! SQLite-backed analytical table the SQL tool queries.

use crate::data::quarter::{Quarter, QuarterRange};
use crate::data::table::{CellValue, ColumnKind, PromotionTable, QUARTER_COLUMN};
use crate::errors::{PromoError, Result};
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

/// Rows returned by a read-only query, rendered as strings
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryOutput {
    /// `No results found.` or `Results (N rows):` plus an aligned text table
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "No results found.".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let format_line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = format!("Results ({} rows):\n", self.rows.len());
        out.push_str(&format_line(self.columns.as_slice()));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &self.rows {
            out.push('\n');
            out.push_str(&format_line(row.as_slice()));
        }
        out
    }
}

pub struct AnalyticsDb {
    conn: Mutex<Connection>,
    table_name: String,
    schema: String,
}

impl AnalyticsDb {
    /// Recreate the database file from scratch and load every row
    pub fn create(path: &Path, table_name: &str, table: &PromotionTable) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;

        let column_defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.kind.sql_type()))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_ident(table_name),
            column_defs.join(", ")
        ))?;

        let placeholders = vec!["?"; table.columns.len()].join(", ");
        let insert_sql = format!("INSERT INTO {} VALUES ({})", quote_ident(table_name), placeholders);

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;

        log::info!(
            "[LOADER] Wrote {} rows to table '{}' in {}",
            table.len(),
            table_name,
            path.display()
        );

        let schema = describe_schema(table_name, table);
        Ok(Self {
            conn: Mutex::new(conn),
            table_name: table_name.to_string(),
            schema,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Schema text given to the model when it writes SQL
    pub fn schema_description(&self) -> &str {
        &self.schema
    }

    /// Run a single read-only statement
    pub fn execute_select(&self, sql: &str) -> Result<QueryOutput> {
        let sql = single_statement(sql)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(PromoError::InvalidQuery(
                "only read-only SELECT statements are allowed".to_string(),
            ));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();
        let mut rows = Vec::new();
        let mut result = stmt.query([])?;
        while let Some(row) = result.next()? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                cells.push(render_value(row.get_ref(i)?));
            }
            rows.push(cells);
        }
        Ok(QueryOutput { columns, rows })
    }

    pub fn row_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table_name)),
            [],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Double-quote an identifier; column names contain `%` and spaces
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Strip trailing semicolons and reject anything holding a second statement
fn single_statement(sql: &str) -> Result<&str> {
    let trimmed = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if trimmed.is_empty() {
        return Err(PromoError::InvalidQuery("empty statement".to_string()));
    }

    let mut quote: Option<char> = None;
    for c in trimmed.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => {
                return Err(PromoError::InvalidQuery(
                    "multiple statements are not allowed".to_string(),
                ));
            }
            None => {}
        }
    }
    Ok(trimmed)
}

fn to_sql_value(cell: &CellValue) -> SqlValue {
    match cell {
        CellValue::Null => SqlValue::Null,
        CellValue::Number(n) => SqlValue::Real(*n),
        CellValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => CellValue::Number(f).to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn describe_schema(table_name: &str, table: &PromotionTable) -> String {
    let mut out = format!(
        "Table {} ({} rows). Quote column names with double quotes.\nColumns:\n",
        quote_ident(table_name),
        table.len()
    );
    for column in &table.columns {
        out.push_str(&format!("- {} {}", quote_ident(&column.name), column.kind.sql_type()));
        if column.name == QUARTER_COLUMN && column.kind == ColumnKind::Text {
            let ranges: Vec<String> = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4]
                .into_iter()
                .map(|q| QuarterRange(q).to_string())
                .collect();
            out.push_str(&format!(" derived from Week: {}, or 'Unknown'", ranges.join(", ")));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_from_reader;

    fn fixture(dir: &Path) -> AnalyticsDb {
        let mut table = load_from_reader(
            "Region,Week,ROI%\nNorth,5,10\nNorth,20,30\nSouth,45,-5\n".as_bytes(),
        )
        .unwrap();
        crate::data::add_quarter_column(&mut table);
        AnalyticsDb::create(&dir.join("promo.db"), "promotions", &table).unwrap()
    }

    #[test]
    fn test_select_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let db = fixture(dir.path());
        assert_eq!(db.row_count().unwrap(), 3);

        let output = db
            .execute_select("SELECT \"Region\", AVG(\"ROI%\") AS avg_roi FROM promotions GROUP BY \"Region\" ORDER BY \"Region\"")
            .unwrap();
        assert_eq!(output.columns, vec!["Region", "avg_roi"]);
        assert_eq!(output.rows, vec![vec!["North", "20"], vec!["South", "-5"]]);

        let rendered = output.render();
        assert!(rendered.starts_with("Results (2 rows):\n"));
        assert!(rendered.contains("North  | 20"));
    }

    #[test]
    fn test_quarter_column_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let db = fixture(dir.path());
        let output = db
            .execute_select("SELECT \"Quarter\" FROM promotions ORDER BY \"Week\"")
            .unwrap();
        let quarters: Vec<&str> = output.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(quarters, vec!["Q1", "Q2", "Q4"]);
        assert!(db.schema_description().contains("\"Quarter\" TEXT derived from Week"));
    }

    #[test]
    fn test_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = fixture(dir.path());
        let err = db.execute_select("DELETE FROM promotions").unwrap_err();
        assert!(matches!(err, PromoError::InvalidQuery(_)));
        let err = db.execute_select("SELECT 1; DROP TABLE promotions").unwrap_err();
        assert!(matches!(err, PromoError::InvalidQuery(_)));
        // Semicolons inside literals and a trailing terminator are fine
        assert!(db.execute_select("SELECT 'a;b';").is_ok());
        assert_eq!(db.row_count().unwrap(), 3);
    }

    #[test]
    fn test_empty_result_message() {
        let dir = tempfile::tempdir().unwrap();
        let db = fixture(dir.path());
        let output = db
            .execute_select("SELECT * FROM promotions WHERE \"Region\" = 'West'")
            .unwrap();
        assert_eq!(output.render(), "No results found.");
    }

    #[test]
    fn test_create_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let db = fixture(dir.path());
        assert_eq!(db.row_count().unwrap(), 3);
    }
}
