use crate::core::types::{hash_word, ContentHash};
use crate::index::hash_set::{ChainedHashSet, SetEntry, StoreStatus};

/// An indexed file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filename {
    pub name: String,
}

impl Filename {
    pub fn hash(&self) -> ContentHash {
        hash_word(&self.name)
    }
}

impl SetEntry for Filename {
    type Key = str;

    fn key(&self) -> &str {
        &self.name
    }

    fn hash_key(key: &str) -> ContentHash {
        hash_word(key)
    }
}

/// Paths whose tokenization completed.
pub struct FilenameSet {
    set: ChainedHashSet<Filename>,
}

impl FilenameSet {
    pub const SIZE_FACTOR: usize = 2;

    pub fn new() -> Self {
        FilenameSet { set: ChainedHashSet::new(Self::SIZE_FACTOR) }
    }

    pub fn with_max_chain_length(max_chain_length: usize) -> Self {
        let mut set = ChainedHashSet::new(Self::SIZE_FACTOR);
        set.set_max_chain_length(max_chain_length);
        FilenameSet { set }
    }

    /// Intern `name`. Each path is added at most once per build, so this
    /// does not check for duplicates.
    pub fn fname_add(&mut self, name: &str) -> StoreStatus {
        self.set.store(Filename { name: name.to_string() })
    }

    pub fn contains(&mut self, name: &str) -> bool {
        self.set.contains(name)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn inner(&self) -> &ChainedHashSet<Filename> {
        &self.set
    }
}

impl Default for FilenameSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fname_add_interns() {
        let mut names = FilenameSet::new();
        for i in 0..500 {
            assert!(names.fname_add(&format!("/src/file{i}.rs")).contains(StoreStatus::STORED));
        }
        assert_eq!(names.len(), 500);
        assert!(names.contains("/src/file42.rs"));
        assert!(!names.contains("/src/file500.rs"));
    }

    #[test]
    fn hash_matches_word_hash() {
        let f = Filename { name: "/etc/hosts".to_string() };
        assert_eq!(f.hash(), hash_word("/etc/hosts"));
    }
}
