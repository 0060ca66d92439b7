use std::cell::Cell;
use std::fs::File;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};
use serde::Serialize;

use crate::core::error::{Error, Result};
use crate::core::types::{ContentHash, HASH_BYTES};
use crate::index::hash_array::HashArray;
use crate::storage::codec::{read_bytes, read_hash, read_u16, read_u32};
use crate::storage::format::{
    FileHeader, TableKind, BUCKET_HEADER_LEN, BUCKET_PAD, ENTRY_HEADER_LEN, HEADER_LEN, TABLE_HEADER_LEN,
};

/// Upper bound on chained table extents, against next-pointer loops.
const MAX_TABLES: usize = 1024;

/// Cap on the scratch buffer reserved at open; a corrupt header cannot
/// force a larger up-front allocation.
const MAX_SCRATCH: usize = 64 << 20;

/// One table extent: where its offset array lives and how many buckets it
/// was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableExtent {
    pub offset: usize,
    pub buckets: usize,
}

/// One chain entry inside a decompressed bucket.
#[derive(Debug, Clone, Copy)]
pub struct RawEntry<'a> {
    pub hash: ContentHash,
    pub body: &'a [u8],
}

impl RawEntry<'_> {
    /// File hashes of a token entry.
    pub fn files(&self) -> Result<Vec<ContentHash>> {
        let count = read_u16(self.body, 0)? as usize;
        if self.body.len() < 2 + count * HASH_BYTES {
            return Err(Error::corrupt(format!(
                "token entry claims {} hashes in {} bytes",
                count,
                self.body.len()
            )));
        }
        (0..count).map(|i| read_hash(self.body, 2 + i * HASH_BYTES)).collect()
    }

    /// Path of a filename entry.
    pub fn name(&self) -> Result<String> {
        let end = self
            .body
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::corrupt("filename entry without terminator"))?;
        String::from_utf8(self.body[..end].to_vec())
            .map_err(|_| Error::corrupt("filename entry is not UTF-8"))
    }
}

/// Walks the entries of one decompressed bucket.
pub struct ChainCursor<'a> {
    payload: &'a [u8],
    pos: Option<usize>,
}

impl<'a> ChainCursor<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        let pos = if payload.is_empty() { None } else { Some(0) };
        ChainCursor { payload, pos }
    }

    fn step(&mut self, pos: usize) -> Result<RawEntry<'a>> {
        let next = read_u32(self.payload, pos)? as usize;
        let hash = read_hash(self.payload, pos + 4)?;
        let body_start = pos + ENTRY_HEADER_LEN;
        let body_end = if next == 0 { self.payload.len() } else { next };
        if next != 0 && next <= pos {
            return Err(Error::corrupt(format!("chain loops back from {} to {}", pos, next)));
        }
        let body = self
            .payload
            .get(body_start..body_end)
            .ok_or_else(|| Error::corrupt(format!("entry at {} runs past its bucket", pos)))?;
        self.pos = if next == 0 { None } else { Some(next) };
        Ok(RawEntry { hash, body })
    }
}

impl<'a> Iterator for ChainCursor<'a> {
    type Item = Result<RawEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.pos?;
        let entry = self.step(pos);
        if entry.is_err() {
            self.pos = None;
        }
        Some(entry)
    }
}

/// A dumped entry, for `gln -D`.
#[derive(Debug, Clone, Serialize)]
pub struct DumpEntry {
    pub table: usize,
    pub bucket: usize,
    pub hash: ContentHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<ContentHash>>,
}

/// Read-only view of one index file.
pub struct IndexReader {
    pub header: FileHeader,
    tables: Vec<TableExtent>,
    mmap: Mmap,
    /// Decompression buffer shared by every bucket read, sized from the
    /// header's max_buffer.
    scratch: Cell<Vec<u8>>,
}

impl IndexReader {
    pub fn open(path: &Path, kind: TableKind) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < HEADER_LEN {
            return Err(Error::corrupt(format!("{} is truncated", path.display())));
        }

        // SAFETY: index files are replaced by rename, never rewritten in place.
        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };
        let header = FileHeader::decode(&mmap, kind)?;
        let tables = Self::read_tables(&mmap, header.first_table as usize)?;

        let scratch = Cell::new(Vec::with_capacity((header.max_buffer as usize).min(MAX_SCRATCH)));

        Ok(IndexReader { header, tables, mmap, scratch })
    }

    fn read_tables(data: &[u8], first: usize) -> Result<Vec<TableExtent>> {
        let mut tables = Vec::new();
        let mut offset = first;
        loop {
            let next = read_u32(data, offset)? as usize;
            let offsets_len = read_u32(data, offset + 4)? as usize;
            if offsets_len == 0 || offsets_len % 4 != 0 {
                return Err(Error::corrupt(format!("bad offset table size {} at {}", offsets_len, offset)));
            }
            read_bytes(data, offset + TABLE_HEADER_LEN, offsets_len)?;
            tables.push(TableExtent { offset, buckets: offsets_len / 4 });

            if next == 0 {
                return Ok(tables);
            }
            if tables.len() >= MAX_TABLES || next == offset {
                return Err(Error::corrupt("table chain does not terminate"));
            }
            offset = next;
        }
    }

    pub fn tables(&self) -> &[TableExtent] {
        &self.tables
    }

    pub fn kind(&self) -> TableKind {
        self.header.kind
    }

    /// Compressed bytes of bucket `b` of `table`, as stored in the map.
    fn compressed_bucket(&self, table: &TableExtent, b: usize) -> Result<&[u8]> {
        let offset = read_u32(&self.mmap, table.offset + TABLE_HEADER_LEN + 4 * b)? as usize;
        if read_bytes(&self.mmap, offset, 1)?[0] != BUCKET_PAD {
            return Err(Error::corrupt(format!("bucket {} at {} lacks its marker", b, offset)));
        }
        let compressed_len = read_u32(&self.mmap, offset + 1)? as usize;
        read_bytes(&self.mmap, offset + BUCKET_HEADER_LEN, compressed_len)
    }

    /// Decompress bucket `b` of `table` into the scratch buffer and hand
    /// the payload to `f`. A nested call from inside `f` decompresses into
    /// a fresh buffer instead.
    fn with_bucket<T, F>(&self, table: &TableExtent, b: usize, f: F) -> Result<T>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        let compressed = self.compressed_bucket(table, b)?;
        let mut scratch = self.scratch.take();
        let out = self
            .header
            .codec
            .decompress_into(compressed, self.header.max_buffer as usize, &mut scratch)
            .and_then(|()| f(&scratch));
        self.scratch.set(scratch);
        out
    }

    /// Visit every entry stored under `hash`, across all tables.
    fn for_each_match<F>(&self, hash: ContentHash, mut f: F) -> Result<()>
    where
        F: FnMut(RawEntry<'_>) -> Result<()>,
    {
        for table in &self.tables {
            self.with_bucket(table, hash as usize % table.buckets, |payload| {
                for entry in ChainCursor::new(payload) {
                    let entry = entry?;
                    if entry.hash == hash {
                        f(entry)?;
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Inverted list of the token hashing to `hash`. Lists from multiple
    /// tables are concatenated.
    pub fn lookup_tokens(&self, hash: ContentHash) -> Result<HashArray> {
        let mut files = HashArray::new();
        self.for_each_match(hash, |entry| {
            files.extend_from_slice(&entry.files()?);
            Ok(())
        })?;
        Ok(files)
    }

    /// Every path hashing to `hash`.
    pub fn lookup_filenames(&self, hash: ContentHash) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.for_each_match(hash, |entry| {
            names.push(entry.name()?);
            Ok(())
        })?;
        Ok(names)
    }

    /// Decode every entry in table and bucket order.
    pub fn dump<F: FnMut(DumpEntry) -> Result<()>>(&self, mut f: F) -> Result<()> {
        for (t, table) in self.tables.iter().enumerate() {
            for b in 0..table.buckets {
                self.with_bucket(table, b, |payload| {
                    for entry in ChainCursor::new(payload) {
                        let entry = entry?;
                        let (name, files) = match self.kind() {
                            TableKind::Filename => (Some(entry.name()?), None),
                            TableKind::Token => (None, Some(entry.files()?)),
                        };
                        f(DumpEntry { table: t, bucket: b, hash: entry.hash, name, files })?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::compress::Codec;
    use crate::core::error::ErrorKind;
    use crate::core::types::hash_word;
    use crate::index::filename::FilenameSet;
    use crate::index::token::TokenSet;
    use crate::storage::index_writer::IndexWriter;
    use tempfile::TempDir;

    #[test]
    fn token_roundtrip_and_stopword_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.db");

        let mut tokens = TokenSet::new();
        for h in [30, 10, 20, 10] {
            tokens.record("needle", 1, h);
        }
        tokens.record("the", 50, 10);
        tokens.inner_mut().get_mut("the").unwrap().stop = true;
        tokens.normalize();

        IndexWriter::new(Codec::Zstd).write_set(tokens.inner(), &path).unwrap();
        let reader = IndexReader::open(&path, TableKind::Token).unwrap();

        assert_eq!(reader.lookup_tokens(hash_word("needle")).unwrap().as_slice(), &[10, 20, 30]);
        assert!(reader.lookup_tokens(hash_word("the")).unwrap().is_empty());
        assert!(reader.lookup_tokens(hash_word("absent")).unwrap().is_empty());

        let mut dumped = Vec::new();
        reader.dump(|e| { dumped.push(e.hash); Ok(()) }).unwrap();
        assert_eq!(dumped, vec![hash_word("needle")]);
    }

    #[test]
    fn filenames_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fname.db");

        let mut names = FilenameSet::new();
        let paths: Vec<String> = (0..300).map(|i| format!("/data/{i}/notes.txt")).collect();
        for p in &paths {
            names.fname_add(p);
        }
        IndexWriter::new(Codec::Lz4).write_set(names.inner(), &path).unwrap();

        let reader = IndexReader::open(&path, TableKind::Filename).unwrap();
        assert_eq!(reader.tables()[0].buckets, names.inner().bucket_count());
        for p in &paths {
            assert!(reader.lookup_filenames(hash_word(p)).unwrap().contains(p));
        }
    }

    #[test]
    fn lookups_decompress_into_header_sized_scratch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fname.db");

        let mut names = FilenameSet::new();
        let paths: Vec<String> = (0..200).map(|i| format!("/srv/{i}/readme.md")).collect();
        for p in &paths {
            names.fname_add(p);
        }
        IndexWriter::new(Codec::Snappy).write_set(names.inner(), &path).unwrap();

        let reader = IndexReader::open(&path, TableKind::Filename).unwrap();
        let max_buffer = reader.header.max_buffer as usize;
        assert!(max_buffer > 0);
        let scratch = reader.scratch.take();
        let cap = scratch.capacity();
        assert!(cap >= max_buffer);
        reader.scratch.set(scratch);

        for p in &paths {
            assert!(reader.lookup_filenames(hash_word(p)).unwrap().contains(p));
        }
        let mut dumped = 0;
        reader
            .dump(|e| {
                // Nested lookups must not disturb the outer bucket walk.
                let name = e.name.unwrap();
                assert!(reader.lookup_filenames(e.hash).unwrap().contains(&name));
                dumped += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(dumped, paths.len());
        assert_eq!(reader.scratch.take().capacity(), cap);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fname.db");
        IndexWriter::new(Codec::None).write_set(FilenameSet::new().inner(), &path).unwrap();
        let err = IndexReader::open(&path, TableKind::Token).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn cursor_stops_on_loop() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&vec![0u8; HASH_BYTES]);
        let mut looping = payload.clone();
        looping.extend_from_slice(&0u32.to_le_bytes());
        looping.extend_from_slice(&vec![0u8; HASH_BYTES]);
        let second = payload.len() as u32;
        looping[..4].copy_from_slice(&second.to_le_bytes());
        looping[second as usize..second as usize + 4].copy_from_slice(&second.to_le_bytes());

        let results: Vec<_> = ChainCursor::new(&looping).collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }
}
