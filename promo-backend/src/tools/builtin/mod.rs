mod ml_prediction;
mod semantic_search;
mod sql_query;

pub use ml_prediction::{MlPredictionTool, NO_MATCHING_DATA};
pub use semantic_search::{NO_RESULTS, SemanticSearchTool, format_results};
pub use sql_query::{SqlQueryTool, strip_code_fences};
