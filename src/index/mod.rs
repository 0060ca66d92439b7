pub mod filename;
pub mod hash_array;
pub mod hash_set;
pub mod stopword;
pub mod token;

pub use filename::FilenameSet;
pub use hash_array::HashArray;
pub use hash_set::ChainedHashSet;
pub use token::TokenSet;
