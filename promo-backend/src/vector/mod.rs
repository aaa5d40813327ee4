pub mod document;
pub mod index;

pub use document::{Metadata, VectorDocument, build_documents};
pub use index::{ScoredDocument, VectorIndex};
