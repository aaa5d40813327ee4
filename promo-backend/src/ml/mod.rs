//! Statistics and regression behind the prediction tool.

pub mod regression;
pub mod scenario;
pub mod stats;

pub use regression::{RidgeModel, TrainedModel, r_squared};
pub use scenario::{Scenario, parse_scenario};
pub use stats::{Summary, filter_rows, statistical_summary, summarize};
