pub mod filters;
pub mod prediction;

pub use filters::{apply_filters, fetch_size, metadata_matches, parse_filters};
pub use prediction::{PredictionMode, classify, detect_target_variable};
