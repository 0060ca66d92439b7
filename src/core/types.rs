/// Numeric type for content hashes (tokens and filenames).
#[cfg(not(feature = "narrow-hash"))]
pub type ContentHash = u32;

#[cfg(feature = "narrow-hash")]
pub type ContentHash = u16;

/// On-disk width of a `ContentHash`.
pub const HASH_BYTES: usize = std::mem::size_of::<ContentHash>();

/// Index format version, written into both file headers.
pub const VERSION: &[u8; 6] = b"000200";

pub const MIN_WORD_LEN: usize = 3;
pub const MAX_WORD_LEN: usize = 512;

/// Hard ceiling for any single growable buffer.
pub const MAX_MEMORY: usize = 1024 * 1024 * 1024;

pub const DEFAULT_WORKERS: usize = 8;
pub const MAX_WORKERS: usize = 64;

/// A pattern matching more tokens than this gets a warning.
pub const TOO_MANY_MATCHES: usize = 25;

// 113, 139, 173 all spread well; relatively prime to byte values in text.
const HASH_MULTIPLIER: u32 = 139;

/// Hash a token or filename.
pub fn hash_word(word: &str) -> ContentHash {
    hash_bytes(word.as_bytes())
}

pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    let h = bytes
        .iter()
        .fold(0u32, |h, &b| h.wrapping_mul(HASH_MULTIPLIER).wrapping_add(b as u32));
    narrow(h)
}

#[cfg(not(feature = "narrow-hash"))]
fn narrow(h: u32) -> ContentHash {
    h
}

#[cfg(feature = "narrow-hash")]
fn narrow(h: u32) -> ContentHash {
    (h % 0xffff) as ContentHash
}
