use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use regex::RegexBuilder;

use crate::core::error::Result;

/// Finds the indexed tokens a query pattern refers to.
pub trait TokenMatcher {
    /// Matching tokens, sorted and without duplicates.
    fn matching_tokens(&self, pattern: &str) -> Result<Vec<String>>;
}

/// Matches patterns as regular expressions against the index vocabulary.
#[derive(Debug, Clone)]
pub struct VocabularyMatcher {
    tokens: Vec<String>,
    case_sensitive: bool,
    subtoken: bool,
}

impl VocabularyMatcher {
    pub fn new(mut tokens: Vec<String>, case_sensitive: bool, subtoken: bool) -> Self {
        tokens.sort();
        tokens.dedup();
        VocabularyMatcher { tokens, case_sensitive, subtoken }
    }

    /// Read a vocabulary file, one token per line, zstd-compressed if
    /// `compressed`.
    pub fn load(path: &Path, compressed: bool, case_sensitive: bool, subtoken: bool) -> Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if compressed {
            Box::new(zstd::stream::read::Decoder::new(file)?)
        } else {
            Box::new(file)
        };
        let tokens = BufReader::new(reader)
            .lines()
            .filter(|l| !matches!(l, Ok(l) if l.is_empty()))
            .collect::<std::io::Result<Vec<String>>>()?;
        Ok(Self::new(tokens, case_sensitive, subtoken))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenMatcher for VocabularyMatcher {
    fn matching_tokens(&self, pattern: &str) -> Result<Vec<String>> {
        let source = if self.subtoken { pattern.to_string() } else { format!("^(?:{})$", pattern) };
        let re = RegexBuilder::new(&source)
            .case_insensitive(!self.case_sensitive)
            .build()?;
        Ok(self.tokens.iter().filter(|t| re.is_match(t)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use std::io::Write;
    use tempfile::TempDir;

    fn vocab(subtoken: bool) -> VocabularyMatcher {
        let words = ["index", "indexer", "reindex", "glean", "Glean", "query"];
        VocabularyMatcher::new(words.iter().map(|w| w.to_string()).collect(), false, subtoken)
    }

    #[test]
    fn whole_token_match() {
        assert_eq!(vocab(false).matching_tokens("index").unwrap(), vec!["index"]);
        assert_eq!(vocab(false).matching_tokens("index.*").unwrap(), vec!["index", "indexer"]);
    }

    #[test]
    fn subtoken_match() {
        assert_eq!(vocab(true).matching_tokens("index").unwrap(), vec!["index", "indexer", "reindex"]);
    }

    #[test]
    fn case_folding_follows_index() {
        assert_eq!(vocab(false).matching_tokens("GLEAN").unwrap(), vec!["Glean", "glean"]);
        let strict = VocabularyMatcher::new(vec!["Glean".into(), "glean".into()], true, false);
        assert_eq!(strict.matching_tokens("glean").unwrap(), vec!["glean"]);
    }

    #[test]
    fn bad_pattern_is_error() {
        assert_eq!(vocab(false).matching_tokens("(").unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn loads_plain_and_compressed() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("tokens");
        std::fs::write(&plain, "beta\nalpha\n\n").unwrap();
        let m = VocabularyMatcher::load(&plain, false, false, false).unwrap();
        assert_eq!(m.len(), 2);

        let packed = dir.path().join("tokens.zst");
        let mut enc = zstd::stream::write::Encoder::new(File::create(&packed).unwrap(), 3).unwrap();
        enc.write_all(b"alpha\nbeta\ngamma\n").unwrap();
        enc.finish().unwrap();
        let m = VocabularyMatcher::load(&packed, true, false, false).unwrap();
        assert_eq!(m.matching_tokens("g.*").unwrap(), vec!["gamma"]);
    }
}
