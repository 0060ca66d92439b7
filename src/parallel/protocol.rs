//! Line protocol between the scheduler and its tokenizer workers.
//!
//! The scheduler writes one path per line. The worker answers with
//! `"<token> <count>"` lines and ends the exchange with `" SKIP"` or
//! `" DONE"`. A `" DONE"` line sent *to* a worker shuts it down.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::{char, u64 as decimal};
use nom::combinator::{all_consuming, map, value};
use nom::sequence::separated_pair;
use nom::{IResult, Parser};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::MAX_MEMORY;

pub const SKIP: &str = " SKIP";
pub const DONE: &str = " DONE";
/// Sent to an idle worker to make it exit.
pub const SHUTDOWN: &[u8] = b" DONE\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    Token { text: &'a str, count: u64 },
    Skip,
    Done,
}

fn token_record(input: &str) -> IResult<&str, Record<'_>> {
    map(
        separated_pair(take_till1(|c: char| c == ' '), char(' '), decimal),
        |(text, count)| Record::Token { text, count },
    )
    .parse(input)
}

fn record(input: &str) -> IResult<&str, Record<'_>> {
    alt((
        value(Record::Skip, tag(SKIP)),
        value(Record::Done, tag(DONE)),
        token_record,
    ))
    .parse(input)
}

/// Parse one worker line, without its newline.
pub fn parse_record(line: &str) -> Result<Record<'_>> {
    match all_consuming(record).parse(line) {
        Ok((_, rec)) => Ok(rec),
        Err(_) => Err(Error::protocol(format!("malformed worker record {:?}", line))),
    }
}

/// Encode a path request. Paths containing a newline cannot be framed.
pub fn encode_path(path: &str) -> Result<Vec<u8>> {
    if path.contains('\n') {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("path contains a newline: {:?}", path),
        ));
    }
    let mut line = Vec::with_capacity(path.len() + 1);
    line.extend_from_slice(path.as_bytes());
    line.push(b'\n');
    Ok(line)
}

pub fn encode_token(out: &mut Vec<u8>, text: &str, count: u64) {
    out.extend_from_slice(text.as_bytes());
    out.push(b' ');
    out.extend_from_slice(count.to_string().as_bytes());
    out.push(b'\n');
}

pub fn encode_sentinel(out: &mut Vec<u8>, sentinel: &str) {
    out.extend_from_slice(sentinel.as_bytes());
    out.push(b'\n');
}

/// Receive buffer for one channel: collects byte chunks and hands back
/// complete lines, keeping any trailing partial line for the next chunk.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    start: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        if self.buf.len() + chunk.len() > MAX_MEMORY {
            return Err(Error::new(
                ErrorKind::ResourceExhausted,
                format!("receive buffer would grow past {} bytes", MAX_MEMORY),
            ));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Next complete line, without its newline.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        let rest = &self.buf[self.start..];
        let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line_start = self.start;
        self.start += nl + 1;
        std::str::from_utf8(&self.buf[line_start..line_start + nl])
            .map(Some)
            .map_err(|_| Error::protocol("worker sent a non-UTF-8 line"))
    }

    /// Bytes of an unfinished line.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.start
    }
}
