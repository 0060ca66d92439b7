use tracing::{debug, warn};

use crate::core::error::Result;
use crate::core::types::{hash_word, ContentHash, TOO_MANY_MATCHES};
use crate::index::hash_array::{complement, intersection, union, HashArray};
use crate::query::matcher::TokenMatcher;
use crate::query::parser::{Operator, Query};
use crate::storage::index_reader::IndexReader;

/// Inverted lists by token hash.
pub trait TokenPostings {
    fn postings(&self, token_hash: ContentHash) -> Result<HashArray>;
}

/// Paths by file hash.
pub trait FilenameResolver {
    fn resolve(&self, file_hash: ContentHash) -> Result<Vec<String>>;
}

impl TokenPostings for IndexReader {
    fn postings(&self, token_hash: ContentHash) -> Result<HashArray> {
        self.lookup_tokens(token_hash)
    }
}

impl FilenameResolver for IndexReader {
    fn resolve(&self, file_hash: ContentHash) -> Result<Vec<String>> {
        self.lookup_filenames(file_hash)
    }
}

/// Runs a query against a vocabulary and the two index files.
pub struct Evaluator<'a, M, P, F> {
    matcher: &'a M,
    postings: &'a P,
    names: &'a F,
}

impl<'a, M, P, F> Evaluator<'a, M, P, F>
where
    M: TokenMatcher,
    P: TokenPostings,
    F: FilenameResolver,
{
    pub fn new(matcher: &'a M, postings: &'a P, names: &'a F) -> Self {
        Evaluator { matcher, postings, names }
    }

    /// Fill in each clause's matched tokens and their sorted hashes.
    pub fn match_tokens(&self, query: &mut Query) -> Result<()> {
        for clause in &mut query.clauses {
            clause.tokens = self.matcher.matching_tokens(&clause.pattern)?;
            if clause.tokens.len() > TOO_MANY_MATCHES {
                warn!(pattern = %clause.pattern, matches = clause.tokens.len(), "pattern matched many tokens");
            }
            clause.token_hashes = clause.tokens.iter().map(|t| hash_word(t)).collect();
            clause.token_hashes.sort();
        }
        Ok(())
    }

    /// Fill in each clause's file hashes from the token index.
    pub fn collect_files(&self, query: &mut Query) -> Result<()> {
        for clause in &mut query.clauses {
            let mut files = HashArray::new();
            for hash in clause.token_hashes.iter() {
                files.extend_from_slice(self.postings.postings(hash)?.as_slice());
            }
            files.sort_uniq();
            debug!(pattern = %clause.pattern, tokens = clause.tokens.len(), files = files.len(), "clause");
            clause.results = files;
        }
        Ok(())
    }

    /// Sorted paths of the given file hashes.
    pub fn resolve(&self, files: &HashArray) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(files.len());
        for hash in files.iter() {
            names.extend(self.names.resolve(hash)?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Match, look up, fold and resolve.
    pub fn evaluate(&self, query: &mut Query) -> Result<Vec<String>> {
        self.match_tokens(query)?;
        self.collect_files(query)?;
        let files = fold(query);
        debug!(files = files.len(), "query folded");
        self.resolve(&files)
    }
}

/// Combine clause results left to right: the first clause seeds the
/// running set, then AND/NEAR intersect, OR unions and NOT removes.
pub fn fold(query: &Query) -> HashArray {
    let mut clauses = query.clauses.iter();
    let Some(first) = clauses.next() else {
        return HashArray::new();
    };
    let mut running = first.results.clone();
    for clause in clauses {
        running = match clause.op {
            Operator::And | Operator::Near => intersection(&running, &clause.results),
            Operator::Or => union(&running, &clause.results),
            Operator::Not => complement(&running, &clause.results),
        };
    }
    running
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixed(HashMap<String, Vec<ContentHash>>);

    impl TokenMatcher for Fixed {
        fn matching_tokens(&self, pattern: &str) -> Result<Vec<String>> {
            let mut out: Vec<String> = self.0.keys().filter(|k| k.starts_with(pattern)).cloned().collect();
            out.sort();
            Ok(out)
        }
    }

    impl TokenPostings for Fixed {
        fn postings(&self, token_hash: ContentHash) -> Result<HashArray> {
            Ok(self
                .0
                .iter()
                .find(|(k, _)| hash_word(k) == token_hash)
                .map(|(_, v)| HashArray::from(v.clone()))
                .unwrap_or_default())
        }
    }

    impl FilenameResolver for Fixed {
        fn resolve(&self, file_hash: ContentHash) -> Result<Vec<String>> {
            Ok(vec![format!("/f/{file_hash}")])
        }
    }

    fn fixture() -> Fixed {
        let mut m = HashMap::new();
        m.insert("apple".to_string(), vec![1, 2, 3, 4]);
        m.insert("apricot".to_string(), vec![4, 9]);
        m.insert("banana".to_string(), vec![3, 4, 5]);
        m.insert("cherry".to_string(), vec![7, 1]);
        Fixed(m)
    }

    fn files(src: &Fixed, text: &str) -> Vec<String> {
        let mut q = Query::parse(text).unwrap();
        Evaluator::new(src, src, src).evaluate(&mut q).unwrap()
    }

    #[test]
    fn and_or_not() {
        let src = fixture();
        assert_eq!(files(&src, "apple AND banana"), vec!["/f/3", "/f/4"]);
        assert_eq!(files(&src, "banana OR cherry"), vec!["/f/1", "/f/3", "/f/4", "/f/5", "/f/7"]);
        assert_eq!(files(&src, "apple NOT banana"), vec!["/f/1", "/f/2"]);
        assert_eq!(files(&src, "apple NEAR banana"), files(&src, "apple AND banana"));
    }

    #[test]
    fn folds_left_to_right() {
        let src = fixture();
        // (apple AND banana) OR cherry, not apple AND (banana OR cherry)
        assert_eq!(files(&src, "apple AND banana OR cherry"), vec!["/f/1", "/f/3", "/f/4", "/f/7"]);
    }

    #[test]
    fn clause_unions_matched_tokens() {
        let src = fixture();
        let mut q = Query::parse("ap").unwrap();
        let eval = Evaluator::new(&src, &src, &src);
        eval.match_tokens(&mut q).unwrap();
        eval.collect_files(&mut q).unwrap();
        assert_eq!(q.clauses[0].tokens, vec!["apple", "apricot"]);
        assert!(q.clauses[0].token_hashes.is_sorted());
        assert_eq!(q.clauses[0].results.as_slice(), &[1, 2, 3, 4, 9]);
    }

    #[test]
    fn unmatched_pattern_gives_nothing() {
        let src = fixture();
        assert!(files(&src, "zebra").is_empty());
        assert!(files(&src, "apple AND zebra").is_empty());
        assert_eq!(files(&src, "cherry NOT zebra"), vec!["/f/1", "/f/7"]);
    }
}
