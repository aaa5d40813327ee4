//! Metadata filters parsed from a question for semantic search.

use crate::vector::document::Metadata;
use serde_json::Value;

pub const QUARTER_KEY: &str = "Quarter";

/// Ordered substring rules; the first hit sets the quarter filter
const QUARTER_PATTERNS: &[(&str, &str)] = &[
    ("q1", "Q1"),
    ("quarter 1", "Q1"),
    ("first quarter", "Q1"),
    ("q2", "Q2"),
    ("quarter 2", "Q2"),
    ("second quarter", "Q2"),
    ("q3", "Q3"),
    ("quarter 3", "Q3"),
    ("third quarter", "Q3"),
    ("q4", "Q4"),
    ("quarter 4", "Q4"),
    ("fourth quarter", "Q4"),
];

pub fn parse_filters(question: &str) -> Metadata {
    let question = question.to_lowercase();
    let mut filters = Metadata::new();
    if let Some((_, quarter)) = QUARTER_PATTERNS.iter().find(|(p, _)| question.contains(*p)) {
        filters.insert(QUARTER_KEY.to_string(), Value::String(quarter.to_string()));
    }
    filters
}

/// A document passes unless it carries a filter key with a different value
pub fn metadata_matches(metadata: &Metadata, filters: &Metadata) -> bool {
    filters
        .iter()
        .all(|(key, wanted)| metadata.get(key).is_none_or(|actual| actual == wanted))
}

/// Number of candidates to pull from the index before filtering
pub fn fetch_size(k: usize, filters: &Metadata) -> usize {
    if filters.is_empty() { k } else { k * 3 }
}

/// Keep candidates (already ranked) that pass the filters, stopping at `k`
pub fn apply_filters<T>(
    candidates: impl IntoIterator<Item = T>,
    metadata_of: impl Fn(&T) -> &Metadata,
    filters: &Metadata,
    k: usize,
) -> Vec<T> {
    candidates
        .into_iter()
        .filter(|c| metadata_matches(metadata_of(c), filters))
        .take(k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_quarter_patterns() {
        assert_eq!(parse_filters("Promotions in Q3 for North")[QUARTER_KEY], "Q3");
        assert_eq!(parse_filters("during the second quarter")[QUARTER_KEY], "Q2");
        assert_eq!(parse_filters("Quarter 4 results")[QUARTER_KEY], "Q4");
        assert!(parse_filters("best promotions overall").is_empty());
    }

    #[test]
    fn test_first_pattern_wins() {
        assert_eq!(parse_filters("compare q1 and q4")[QUARTER_KEY], "Q1");
    }

    #[test]
    fn test_missing_key_is_kept() {
        let filters = parse_filters("q2");
        assert!(metadata_matches(&meta(&[("Region", json!("North"))]), &filters));
        assert!(metadata_matches(&meta(&[("Quarter", json!("Q2"))]), &filters));
        assert!(!metadata_matches(&meta(&[("Quarter", json!("Q3"))]), &filters));
    }

    #[test]
    fn test_over_fetch_and_stop_at_k() {
        let filters = parse_filters("q1");
        assert_eq!(fetch_size(10, &filters), 30);
        assert_eq!(fetch_size(10, &Metadata::new()), 10);

        let candidates = vec![
            meta(&[("Quarter", json!("Q2"))]),
            meta(&[("Quarter", json!("Q1")), ("row_index", json!(1))]),
            meta(&[("row_index", json!(2))]),
            meta(&[("Quarter", json!("Q1")), ("row_index", json!(3))]),
        ];
        let kept = apply_filters(candidates, |m| m, &filters, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0]["row_index"], 1);
        assert_eq!(kept[1]["row_index"], 2);
    }
}
