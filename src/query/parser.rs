use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::{is_not, take_till1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{all_consuming, verify};
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::{IResult, Parser};
use tracing::warn;

use crate::core::error::{Error, ErrorKind, Result};
use crate::index::hash_array::HashArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    /// Proximity is not tracked; evaluates as `And`.
    Near,
}

impl Operator {
    pub fn keyword(word: &str) -> Option<Self> {
        match word {
            "AND" => Some(Operator::And),
            "OR" => Some(Operator::Or),
            "NOT" => Some(Operator::Not),
            "NEAR" => Some(Operator::Near),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Near => "NEAR",
        })
    }
}

/// One pattern of a query and what it matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub op: Operator,
    pub pattern: String,
    /// Vocabulary tokens the pattern matched.
    pub tokens: Vec<String>,
    /// Hashes of `tokens`, sorted.
    pub token_hashes: HashArray,
    /// Files containing any of `tokens`, sorted and deduplicated.
    pub results: HashArray,
}

impl Clause {
    pub fn new(op: Operator, pattern: &str) -> Self {
        Clause {
            op,
            pattern: pattern.to_string(),
            tokens: Vec::new(),
            token_hashes: HashArray::new(),
            results: HashArray::new(),
        }
    }
}

/// Patterns joined by operators, folded strictly left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Build a query from already split words, e.g. command-line arguments.
    /// An operator keyword applies to the next pattern; patterns without
    /// one are ANDed.
    pub fn from_terms<S: AsRef<str>>(terms: &[S]) -> Result<Self> {
        let mut clauses: Vec<Clause> = Vec::new();
        let mut pending: Option<Operator> = None;

        for term in terms {
            let term = term.as_ref();
            if let Some(op) = Operator::keyword(term) {
                if clauses.is_empty() {
                    warn!(operator = %op, "operator before the first pattern ignored");
                }
                pending = Some(op);
                continue;
            }
            let op = if clauses.is_empty() { Operator::And } else { pending.unwrap_or(Operator::And) };
            clauses.push(Clause::new(op, term));
            pending = None;
        }
        if let Some(op) = pending {
            if !clauses.is_empty() {
                warn!(operator = %op, "trailing operator ignored");
            }
        }
        if clauses.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "query has no patterns".to_string()));
        }
        Ok(Query { clauses })
    }

    /// Parse a query string. Words are split on whitespace; a pattern may
    /// be double-quoted to include spaces.
    pub fn parse(input: &str) -> Result<Self> {
        let words = match all_consuming(delimited(multispace0, words, multispace0)).parse(input) {
            Ok((_, words)) => words,
            Err(_) => {
                return Err(Error::new(ErrorKind::Parse, format!("cannot parse query {:?}", input)));
            }
        };
        Self::from_terms(&words)
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, c) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", c.op)?;
            }
            f.write_str(&c.pattern)?;
        }
        Ok(())
    }
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), is_not("\""), char('"')).parse(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    verify(take_till1(|c: char| c.is_whitespace()), |w: &str| !w.starts_with('"')).parse(input)
}

fn words(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list0(multispace1, alt((quoted, bare))).parse(input)
}
