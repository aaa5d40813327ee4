//! Per-request execution tracking.
//!
//! Each query runs under its own execution id so tool usage and streaming
//! status never leak between concurrent requests.

mod tracker;

pub use tracker::{ExecutionTracker, ToolUsage};
