pub mod tokenizer;

pub use tokenizer::FileTokenizer;
