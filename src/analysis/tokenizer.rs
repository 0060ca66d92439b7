use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use unicode_segmentation::UnicodeSegmentation;

use crate::core::config::Config;
use crate::core::types::{MAX_MEMORY, MAX_WORD_LEN, MIN_WORD_LEN};

/// Size of the chunk inspected for binary content.
const SNIFF_LEN: usize = 64 * 1024;
/// Files shorter than this are never judged binary.
const SNIFF_MIN: usize = 100;
const MIN_PRINTABLE_RATIO: f64 = 0.8;

/// Per-file token counts, ordered by token.
pub type TokenCounts = BTreeMap<String, u64>;

/// Splits file content into tokens: alphabetic runs inside Unicode words,
/// bounded in byte length.
#[derive(Debug, Clone)]
pub struct FileTokenizer {
    pub case_sensitive: bool,
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for FileTokenizer {
    fn default() -> Self {
        FileTokenizer {
            case_sensitive: false,
            min_len: MIN_WORD_LEN,
            max_len: MAX_WORD_LEN,
        }
    }
}

impl FileTokenizer {
    pub fn from_config(config: &Config) -> Self {
        FileTokenizer {
            case_sensitive: config.case_sensitive,
            min_len: config.min_word_len,
            max_len: config.max_word_len,
        }
    }

    /// Count the tokens of the file at `path`. `None` means the file should
    /// be skipped: unreadable, binary, or too large.
    pub fn tokenize_file(&self, path: &Path) -> Option<TokenCounts> {
        let mut file = File::open(path).ok()?;
        let len = file.metadata().ok()?.len() as usize;
        if len > MAX_MEMORY {
            return None;
        }
        let mut data = Vec::with_capacity(len);
        file.read_to_end(&mut data).ok()?;

        if looks_binary(&data[..data.len().min(SNIFF_LEN)]) {
            return None;
        }
        Some(self.tokenize_text(&String::from_utf8_lossy(&data)))
    }

    pub fn tokenize_text(&self, text: &str) -> TokenCounts {
        let mut counts = TokenCounts::new();
        for word in text.unicode_words() {
            for run in word.split(|c: char| !c.is_alphabetic()) {
                if run.len() < self.min_len || run.len() > self.max_len {
                    continue;
                }
                let token = if self.case_sensitive { run.to_string() } else { run.to_lowercase() };
                *counts.entry(token).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// A chunk is binary when fewer than 80% of its bytes are printable text.
/// Non-ASCII bytes count as text only inside valid UTF-8.
pub fn looks_binary(chunk: &[u8]) -> bool {
    if chunk.len() < SNIFF_MIN {
        return false;
    }
    let utf8 = match std::str::from_utf8(chunk) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(), // cut mid-character at chunk end
    };
    let printable = chunk
        .iter()
        .filter(|&&b| b.is_ascii_graphic() || b.is_ascii_whitespace() || (utf8 && b >= 0x80))
        .count();
    (printable as f64) < chunk.len() as f64 * MIN_PRINTABLE_RATIO
}
