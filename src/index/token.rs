use crate::core::types::{hash_word, ContentHash};
use crate::index::hash_array::HashArray;
use crate::index::hash_set::{ChainedHashSet, SetEntry, StoreStatus, DEFAULT_MAX_CHAIN_LENGTH};

/// An interned token and its inverted list.
#[derive(Debug, Clone)]
pub struct Token {
    pub name: String,
    pub count: u64,
    pub stop: bool,
    /// One hash per distinct file the token occurs in.
    pub files: HashArray,
}

impl Token {
    pub fn new(name: &str) -> Self {
        Token {
            name: name.to_string(),
            count: 1,
            stop: false,
            files: HashArray::new(),
        }
    }

    pub fn hash(&self) -> ContentHash {
        hash_word(&self.name)
    }

    /// Note that the token occurs in the file hashing to `file_hash`.
    pub fn note_file(&mut self, file_hash: ContentHash) {
        self.files.append(file_hash);
    }
}

impl SetEntry for Token {
    type Key = str;

    fn key(&self) -> &str {
        &self.name
    }

    fn hash_key(key: &str) -> ContentHash {
        hash_word(key)
    }
}

/// The build's token vocabulary.
pub struct TokenSet {
    set: ChainedHashSet<Token>,
    occurrences: u64,
    resizes: usize,
}

impl TokenSet {
    /// Initial bucket count index into `hash_set::PRIMES`.
    pub const SIZE_FACTOR: usize = 4;

    pub fn new() -> Self {
        Self::with_max_chain_length(DEFAULT_MAX_CHAIN_LENGTH)
    }

    pub fn with_max_chain_length(max_chain_length: usize) -> Self {
        let mut set = ChainedHashSet::new(Self::SIZE_FACTOR);
        set.set_max_chain_length(max_chain_length);
        TokenSet { set, occurrences: 0, resizes: 0 }
    }

    /// Intern one occurrence of `text`: a new token starts at count 1,
    /// an existing one is incremented.
    pub fn word_add(&mut self, text: &str) -> &mut Token {
        self.occurrences += 1;
        let (token, status) = self.set.get_or_store(text, || Token::new(text));
        if status.is_empty() {
            token.count += 1;
        } else if status.contains(StoreStatus::RESIZED) {
            self.resizes += 1;
        }
        token
    }

    /// Intern a `"<token> <count>"` record for one file: `count` occurrences
    /// and one inverted-list entry for `file_hash`.
    pub fn record(&mut self, text: &str, count: u64, file_hash: ContentHash) {
        let extra = count.saturating_sub(1);
        self.occurrences += extra;
        let token = self.word_add(text);
        token.count += extra;
        token.note_file(file_hash);
    }

    pub fn get(&mut self, text: &str) -> Option<&Token> {
        self.set.get(text)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Total occurrences across every token.
    pub fn occurrence_count(&self) -> u64 {
        self.occurrences
    }

    pub fn resize_count(&self) -> usize {
        self.resizes
    }

    pub fn stopword_count(&self) -> usize {
        self.set.iter().filter(|t| t.stop).count()
    }

    pub fn inner(&self) -> &ChainedHashSet<Token> {
        &self.set
    }

    pub fn inner_mut(&mut self) -> &mut ChainedHashSet<Token> {
        &mut self.set
    }

    /// Sort and dedup every inverted list ahead of writing.
    pub fn normalize(&mut self) {
        self.set.for_each_mut(|t| t.files.sort_uniq());
    }
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::new()
    }
}
