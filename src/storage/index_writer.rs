use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::compression::compress::Codec;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ContentHash, MAX_MEMORY};
use crate::index::filename::Filename;
use crate::index::hash_set::{ChainedHashSet, SetEntry};
use crate::index::token::Token;
use crate::storage::codec::{patch_u32, put_hash, put_u16, put_u32};
use crate::storage::format::{
    FileHeader, TableKind, BUCKET_PAD, HEADER_LEN, MAX_ENTRY_HASHES, TABLE_HEADER_LEN,
};

/// Buckets encoded and compressed per parallel batch.
const BATCH_BUCKETS: usize = 4096;

/// Builds one bucket's decompressed payload: a chain of entries, each
/// starting with the payload offset of the next one.
pub struct ChainBuilder {
    buf: Vec<u8>,
    last_next: Option<usize>,
    entries: usize,
}

impl ChainBuilder {
    pub fn new() -> Self {
        ChainBuilder { buf: Vec::new(), last_next: None, entries: 0 }
    }

    /// Start an entry for `hash` and return the buffer to append its
    /// payload to. The previous entry is linked here only now, so skipped
    /// entries leave no gap in the chain.
    pub fn begin_entry(&mut self, hash: ContentHash) -> Result<&mut Vec<u8>> {
        let at = self.buf.len();
        if at >= MAX_MEMORY {
            return Err(Error::new(
                ErrorKind::ResourceExhausted,
                format!("bucket payload reached {} bytes", at),
            ));
        }
        if let Some(prev) = self.last_next {
            patch_u32(&mut self.buf, prev, at as u32)?;
        }
        self.last_next = Some(at);
        put_u32(&mut self.buf, 0);
        put_hash(&mut self.buf, hash);
        self.entries += 1;
        Ok(&mut self.buf)
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A set entry that can be serialized into a bucket chain.
pub trait IndexEntry: SetEntry + Sync {
    const KIND: TableKind;

    /// Append zero or more chain entries for `self`.
    fn encode_into(&self, chain: &mut ChainBuilder) -> Result<()>;
}

impl IndexEntry for Token {
    const KIND: TableKind = TableKind::Token;

    fn encode_into(&self, chain: &mut ChainBuilder) -> Result<()> {
        if self.stop {
            return Ok(());
        }
        let hash = self.hash();
        let files = self.files.as_slice();
        if files.is_empty() {
            put_u16(chain.begin_entry(hash)?, 0);
            return Ok(());
        }
        for part in files.chunks(MAX_ENTRY_HASHES) {
            let buf = chain.begin_entry(hash)?;
            put_u16(buf, part.len() as u16);
            for &file_hash in part {
                put_hash(buf, file_hash);
            }
        }
        Ok(())
    }
}

impl IndexEntry for Filename {
    const KIND: TableKind = TableKind::Filename;

    fn encode_into(&self, chain: &mut ChainBuilder) -> Result<()> {
        let buf = chain.begin_entry(self.hash())?;
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(0);
        Ok(())
    }
}

/// Encode bucket `b` of `set`.
pub fn encode_bucket<E: IndexEntry>(set: &ChainedHashSet<E>, b: usize) -> Result<ChainBuilder> {
    let mut chain = ChainBuilder::new();
    for entry in set.bucket(b) {
        entry.encode_into(&mut chain)?;
    }
    Ok(chain)
}

/// Byte size of the offset table for `buckets` buckets.
pub fn offsets_len(buckets: usize) -> Result<u32> {
    buckets
        .checked_mul(4)
        .and_then(|len| u32::try_from(len).ok())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::ResourceExhausted,
                format!("offset table for {} buckets exceeds 4 GiB", buckets),
            )
        })
}

/// What one `write_set` produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub buckets: usize,
    pub entries: usize,
    pub bytes: u64,
    pub max_buffer: u32,
}

struct EncodedBucket {
    compressed: Vec<u8>,
    raw_len: usize,
    entries: usize,
}

/// Serializes a hash set into an index file.
pub struct IndexWriter {
    codec: Codec,
}

impl IndexWriter {
    pub fn new(codec: Codec) -> Self {
        IndexWriter { codec }
    }

    /// Write `set` to `path`. The file is assembled next to `path` and
    /// renamed into place once complete.
    pub fn write_set<E: IndexEntry>(&self, set: &ChainedHashSet<E>, path: &Path) -> Result<WriteSummary> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let buckets = set.bucket_count();
        let table_len = offsets_len(buckets)?;
        let first_table = HEADER_LEN as u64;
        let data_start = first_table + TABLE_HEADER_LEN as u64 + table_len as u64;

        // Header and offset table are written last, over the reserved span.
        let mut out = BufWriter::new(NamedTempFile::new_in(dir)?);
        out.seek(SeekFrom::Start(data_start))?;

        let mut offsets = Vec::with_capacity(buckets);
        let mut summary = WriteSummary { buckets, ..WriteSummary::default() };
        let mut pos = data_start;

        for start in (0..buckets).step_by(BATCH_BUCKETS) {
            let end = (start + BATCH_BUCKETS).min(buckets);
            let batch: Vec<EncodedBucket> = (start..end)
                .into_par_iter()
                .map(|b| self.compress_bucket(set, b))
                .collect::<Result<_>>()?;

            for bucket in batch {
                let offset = u32::try_from(pos).map_err(|_| {
                    Error::new(ErrorKind::ResourceExhausted, format!("{} index exceeds 4 GiB", E::KIND.name()))
                })?;
                offsets.push(offset);

                out.write_all(&[BUCKET_PAD])?;
                out.write_all(&(bucket.compressed.len() as u32).to_le_bytes())?;
                out.write_all(&bucket.compressed)?;
                pos += 5 + bucket.compressed.len() as u64;

                summary.entries += bucket.entries;
                summary.max_buffer = summary.max_buffer.max(bucket.raw_len as u32);
            }
        }
        summary.bytes = pos;

        let mut head = FileHeader {
            kind: E::KIND,
            codec: self.codec,
            max_buffer: summary.max_buffer,
            first_table: first_table as u32,
        }
        .encode();
        put_u32(&mut head, 0);
        put_u32(&mut head, table_len);
        for offset in offsets {
            put_u32(&mut head, offset);
        }

        let mut file = out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&head)?;
        file.as_file().sync_all()?;
        file.persist(path)?;

        info!(
            kind = E::KIND.name(),
            buckets,
            entries = summary.entries,
            bytes = summary.bytes,
            path = %path.display(),
            "index written"
        );
        Ok(summary)
    }

    fn compress_bucket<E: IndexEntry>(&self, set: &ChainedHashSet<E>, b: usize) -> Result<EncodedBucket> {
        let chain = encode_bucket(set, b)?;
        let entries = chain.entries();
        let raw = chain.finish();
        let compressed = self.codec.compress(&raw)?;
        if entries > 0 {
            debug!(bucket = b, entries, raw = raw.len(), compressed = compressed.len(), "bucket");
        }
        Ok(EncodedBucket { compressed, raw_len: raw.len(), entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{hash_word, HASH_BYTES};
    use crate::storage::codec::{read_hash, read_u16, read_u32};

    fn token(name: &str, files: &[ContentHash], stop: bool) -> Token {
        let mut t = Token::new(name);
        t.stop = stop;
        t.files.extend_from_slice(files);
        t
    }

    #[test]
    fn stopword_leaves_no_gap() {
        let mut chain = ChainBuilder::new();
        token("first", &[1, 2], false).encode_into(&mut chain).unwrap();
        token("common", &[1, 2, 3], true).encode_into(&mut chain).unwrap();
        token("third", &[3], false).encode_into(&mut chain).unwrap();
        assert_eq!(chain.entries(), 2);
        let buf = chain.finish();

        let second = read_u32(&buf, 0).unwrap() as usize;
        assert_eq!(second, 4 + HASH_BYTES + 2 + 2 * HASH_BYTES);
        assert_eq!(read_hash(&buf, second + 4).unwrap(), hash_word("third"));
        assert_eq!(read_u32(&buf, second).unwrap(), 0);
        assert_eq!(second + 4 + HASH_BYTES + 2 + HASH_BYTES, buf.len());
    }

    #[test]
    fn long_lists_split() {
        let files: Vec<ContentHash> = (0..(MAX_ENTRY_HASHES + 10) as u32).map(|h| h as ContentHash).collect();
        let mut chain = ChainBuilder::new();
        token("huge", &files, false).encode_into(&mut chain).unwrap();
        assert_eq!(chain.entries(), 2);
        let buf = chain.finish();
        assert_eq!(read_u16(&buf, 4 + HASH_BYTES).unwrap() as usize, MAX_ENTRY_HASHES);
    }

    #[test]
    fn offset_table_size_is_bounded() {
        assert_eq!(offsets_len(1021).unwrap(), 4084);
        assert_eq!(offsets_len(1 << 30).unwrap_err().kind(), ErrorKind::ResourceExhausted);
        assert!(offsets_len((1 << 30) - 1).is_ok());
    }

    #[test]
    fn reserved_header_is_overwritten() {
        use crate::index::token::TokenSet;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token.db");
        let mut tokens = TokenSet::new();
        tokens.record("lantern", 2, 7);
        let summary = IndexWriter::new(Codec::Lz4).write_set(tokens.inner(), &path).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len() as u64, summary.bytes);
        let header = FileHeader::decode(&data, TableKind::Token).unwrap();
        assert_eq!(header.first_table as usize, HEADER_LEN);
        assert_eq!(read_u32(&data, HEADER_LEN + 4).unwrap() as usize, 4 * summary.buckets);
        let first_bucket = read_u32(&data, HEADER_LEN + TABLE_HEADER_LEN).unwrap() as usize;
        assert_eq!(first_bucket, HEADER_LEN + TABLE_HEADER_LEN + 4 * summary.buckets);
        assert_eq!(data[first_bucket], BUCKET_PAD);
    }

    #[test]
    fn filename_entry_is_nul_terminated() {
        let mut chain = ChainBuilder::new();
        Filename { name: "/tmp/a.txt".to_string() }.encode_into(&mut chain).unwrap();
        let buf = chain.finish();
        assert_eq!(buf.last(), Some(&0));
        assert_eq!(&buf[4 + HASH_BYTES..buf.len() - 1], b"/tmp/a.txt");
    }
}
