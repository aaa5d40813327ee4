use crate::data::table::CellValue;
use chrono::{Datelike, NaiveDate};
use std::fmt;
use strum::{Display, EnumString};

/// Fiscal quarter derived from a week number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Weeks 1-13 → Q1, 14-26 → Q2, 27-39 → Q3, 40-52 → Q4
    pub fn from_week(week: u32) -> Option<Self> {
        match week {
            1..=13 => Some(Quarter::Q1),
            14..=26 => Some(Quarter::Q2),
            27..=39 => Some(Quarter::Q3),
            40..=52 => Some(Quarter::Q4),
            _ => None,
        }
    }
}

/// Week number from a raw `Week` cell: `dd-mm-yyyy` dates resolve to their
/// ISO week, integral numbers are the week itself.
pub fn week_number(value: &CellValue) -> Option<u32> {
    match value {
        CellValue::Null => None,
        CellValue::Number(n) => integral_week(*n),
        CellValue::Text(s) => parse_week_text(s),
    }
}

fn parse_week_text(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d-%m-%Y") {
        return Some(date.iso_week().week());
    }
    raw.parse::<f64>().ok().and_then(integral_week)
}

fn integral_week(n: f64) -> Option<u32> {
    if n.fract() == 0.0 && n >= 0.0 && n <= u32::MAX as f64 {
        Some(n as u32)
    } else {
        None
    }
}

/// Quarter label for the analytical table (`Unknown` when underivable)
pub fn quarter_label(week_cell: &CellValue) -> String {
    week_number(week_cell)
        .and_then(Quarter::from_week)
        .map(|q| q.to_string())
        .unwrap_or_else(|| crate::data::table::UNKNOWN_QUARTER.to_string())
}

pub struct QuarterRange(pub Quarter);

impl fmt::Display for QuarterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = match self.0 {
            Quarter::Q1 => (1, 13),
            Quarter::Q2 => (14, 26),
            Quarter::Q3 => (27, 39),
            Quarter::Q4 => (40, 52),
        };
        write!(f, "{} (weeks {}-{})", self.0, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_boundaries() {
        assert_eq!(Quarter::from_week(1), Some(Quarter::Q1));
        assert_eq!(Quarter::from_week(13), Some(Quarter::Q1));
        assert_eq!(Quarter::from_week(14), Some(Quarter::Q2));
        assert_eq!(Quarter::from_week(26), Some(Quarter::Q2));
        assert_eq!(Quarter::from_week(27), Some(Quarter::Q3));
        assert_eq!(Quarter::from_week(40), Some(Quarter::Q4));
        assert_eq!(Quarter::from_week(52), Some(Quarter::Q4));
        assert_eq!(Quarter::from_week(53), None);
        assert_eq!(Quarter::from_week(0), None);
    }

    #[test]
    fn test_week_from_date_text() {
        // 2024-01-15 is in ISO week 3
        assert_eq!(week_number(&CellValue::Text("15-01-2024".to_string())), Some(3));
        // 2024-07-01 is in ISO week 27
        assert_eq!(week_number(&CellValue::Text("01-07-2024".to_string())), Some(27));
    }

    #[test]
    fn test_week_from_numbers() {
        assert_eq!(week_number(&CellValue::Number(40.0)), Some(40));
        assert_eq!(week_number(&CellValue::Text("12".to_string())), Some(12));
        assert_eq!(week_number(&CellValue::Number(12.5)), None);
        assert_eq!(week_number(&CellValue::Text("soon".to_string())), None);
        assert_eq!(week_number(&CellValue::Null), None);
    }

    #[test]
    fn test_quarter_label() {
        assert_eq!(quarter_label(&CellValue::Number(30.0)), "Q3");
        assert_eq!(quarter_label(&CellValue::Number(53.0)), "Unknown");
        assert_eq!(quarter_label(&CellValue::Null), "Unknown");
        assert_eq!(QuarterRange(Quarter::Q2).to_string(), "Q2 (weeks 14-26)");
    }
}
