pub mod evaluator;
pub mod grep;
pub mod matcher;
pub mod parser;

pub use evaluator::Evaluator;
pub use matcher::{TokenMatcher, VocabularyMatcher};
pub use parser::{Clause, Operator, Query};
