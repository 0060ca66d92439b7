//! Layout shared by the filename and token index files.
//!
//! ```text
//! header  : magic[4] ' ' version[6] codec[1] max_buffer u32 first_table u32
//! table   : next_table u32  offsets_len u32  offsets[u32; buckets]
//! bucket  : 'X'  compressed_len u32  compressed[compressed_len]
//! entry   : next u32  hash  payload
//! ```
//!
//! Offsets in tables are absolute file offsets; `next` inside a bucket is an
//! offset into that bucket's decompressed payload, 0 ending the chain.

use crate::compression::compress::Codec;
use crate::core::error::{Error, Result};
use crate::core::types::{HASH_BYTES, VERSION};
use crate::storage::codec::{put_u32, read_bytes, read_u32};

pub const HEADER_LEN: usize = 20;
pub const TABLE_HEADER_LEN: usize = 8;
pub const BUCKET_PAD: u8 = b'X';
pub const BUCKET_HEADER_LEN: usize = 5;
pub const ENTRY_HEADER_LEN: usize = 4 + HASH_BYTES;

/// Longest inverted list stored in one token entry; longer lists spill
/// into further entries with the same hash.
pub const MAX_ENTRY_HASHES: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Filename,
    Token,
}

impl TableKind {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            TableKind::Filename => b"glnF",
            TableKind::Token => b"glnT",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Filename => "filename",
            TableKind::Token => "token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub kind: TableKind,
    pub codec: Codec,
    /// Largest decompressed bucket, in bytes.
    pub max_buffer: u32,
    pub first_table: u32,
}

impl FileHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(self.kind.magic());
        buf.push(b' ');
        buf.extend_from_slice(VERSION);
        buf.push(self.codec.tag());
        put_u32(&mut buf, self.max_buffer);
        put_u32(&mut buf, self.first_table);
        buf
    }

    /// Parse and validate the header of a `kind` file.
    pub fn decode(data: &[u8], kind: TableKind) -> Result<Self> {
        let magic = read_bytes(data, 0, 4)
            .map_err(|_| Error::corrupt(format!("{} index truncated", kind.name())))?;
        if magic != kind.magic() {
            return Err(Error::corrupt(format!(
                "bad magic {:?}, expected {} index",
                String::from_utf8_lossy(magic),
                kind.name()
            )));
        }
        let version = read_bytes(data, 5, VERSION.len())?;
        if version != VERSION {
            return Err(Error::corrupt(format!(
                "index version {} does not match {}, rebuild the index",
                String::from_utf8_lossy(version),
                String::from_utf8_lossy(VERSION)
            )));
        }
        Ok(FileHeader {
            kind,
            codec: Codec::from_tag(read_bytes(data, 11, 1)?[0])?,
            max_buffer: read_u32(data, 12)?,
            first_table: read_u32(data, 16)?,
        })
    }
}
