pub mod indexer;
pub mod searcher;

pub use indexer::Indexer;
pub use searcher::{SearchResult, Searcher};
