use crate::tools::ToolKind;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tools invoked during one query, in call order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolUsage {
    pub calls: Vec<ToolKind>,
}

impl ToolUsage {
    pub fn last(&self) -> Option<ToolKind> {
        self.calls.last().copied()
    }

    /// Per-tool call counts, always listing all three tools
    pub fn counts(&self) -> BTreeMap<String, usize> {
        use strum::IntoEnumIterator;
        let mut counts: BTreeMap<String, usize> =
            ToolKind::iter().map(|k| (k.to_string(), 0)).collect();
        for kind in &self.calls {
            *counts.entry(kind.to_string()).or_default() += 1;
        }
        counts
    }

    /// Distinct tool names in first-use order
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for kind in &self.calls {
            let name = kind.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Tracks which tools each in-flight query has used.
///
/// Every query gets its own execution id, so concurrent requests never
/// see each other's usage.
pub struct ExecutionTracker {
    executions: DashMap<String, ToolUsage>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self {
            executions: DashMap::new(),
        }
    }

    /// Start tracking a new query and return its execution id
    pub fn start_execution(&self) -> String {
        let execution_id = Uuid::new_v4().to_string();
        self.executions.insert(execution_id.clone(), ToolUsage::default());
        log::debug!("[EXECUTION_TRACKER] Started execution {}", execution_id);
        execution_id
    }

    pub fn record(&self, execution_id: &str, kind: ToolKind) {
        match self.executions.get_mut(execution_id) {
            Some(mut usage) => usage.calls.push(kind),
            None => log::warn!(
                "[EXECUTION_TRACKER] Ignoring {} usage for unknown execution {}",
                kind,
                execution_id
            ),
        }
    }

    pub fn usage(&self, execution_id: &str) -> ToolUsage {
        self.executions
            .get(execution_id)
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Stop tracking and return the final usage
    pub fn finish_execution(&self, execution_id: &str) -> ToolUsage {
        let usage = self
            .executions
            .remove(execution_id)
            .map(|(_, usage)| usage)
            .unwrap_or_default();
        log::debug!(
            "[EXECUTION_TRACKER] Finished execution {} ({} tool calls)",
            execution_id,
            usage.calls.len()
        );
        usage
    }

    pub fn active_count(&self) -> usize {
        self.executions.len()
    }
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_is_isolated_per_execution() {
        let tracker = ExecutionTracker::new();
        let a = tracker.start_execution();
        let b = tracker.start_execution();

        tracker.record(&a, ToolKind::SqlQuery);
        tracker.record(&b, ToolKind::MlPrediction);
        tracker.record(&a, ToolKind::SemanticSearch);

        assert_eq!(tracker.usage(&a).calls, vec![ToolKind::SqlQuery, ToolKind::SemanticSearch]);
        assert_eq!(tracker.usage(&b).last(), Some(ToolKind::MlPrediction));
        assert_eq!(tracker.active_count(), 2);
    }

    #[test]
    fn test_finish_removes_execution() {
        let tracker = ExecutionTracker::new();
        let id = tracker.start_execution();
        tracker.record(&id, ToolKind::SqlQuery);

        let usage = tracker.finish_execution(&id);
        assert_eq!(usage.calls.len(), 1);
        assert_eq!(tracker.active_count(), 0);

        // Late records after finish are dropped
        tracker.record(&id, ToolKind::SqlQuery);
        assert!(tracker.usage(&id).calls.is_empty());
    }

    #[test]
    fn test_counts_and_names() {
        let usage = ToolUsage {
            calls: vec![ToolKind::SqlQuery, ToolKind::SqlQuery, ToolKind::MlPrediction],
        };
        let counts = usage.counts();
        assert_eq!(counts["sql_query"], 2);
        assert_eq!(counts["semantic_search"], 0);
        assert_eq!(counts["ml_prediction"], 1);
        assert_eq!(usage.tool_names(), vec!["sql_query", "ml_prediction"]);
    }
}
