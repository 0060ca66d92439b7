//! Fixed-width little-endian encoding for the index files.

use bytes::{Buf, BufMut};

use crate::core::error::{Error, Result};
use crate::core::types::{ContentHash, HASH_BYTES};

pub fn put_u32<B: BufMut>(buf: &mut B, value: u32) {
    buf.put_u32_le(value);
}

pub fn put_u16<B: BufMut>(buf: &mut B, value: u16) {
    buf.put_u16_le(value);
}

#[cfg(not(feature = "narrow-hash"))]
pub fn put_hash<B: BufMut>(buf: &mut B, value: ContentHash) {
    buf.put_u32_le(value);
}

#[cfg(feature = "narrow-hash")]
pub fn put_hash<B: BufMut>(buf: &mut B, value: ContentHash) {
    buf.put_u16_le(value);
}

/// Overwrite four bytes at `offset` of an already written buffer.
pub fn patch_u32(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let len = buf.len();
    let slot = buf
        .get_mut(offset..offset + 4)
        .ok_or_else(|| Error::corrupt(format!("patch at {} past end of {}-byte buffer", offset, len)))?;
    slot.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

fn window(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            Error::corrupt(format!(
                "read of {} bytes at {} past end of {}-byte buffer",
                len,
                offset,
                data.len()
            ))
        })
}

pub fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    Ok(window(data, offset, 4)?.get_u32_le())
}

pub fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    Ok(window(data, offset, 2)?.get_u16_le())
}

#[cfg(not(feature = "narrow-hash"))]
pub fn read_hash(data: &[u8], offset: usize) -> Result<ContentHash> {
    Ok(window(data, offset, HASH_BYTES)?.get_u32_le())
}

#[cfg(feature = "narrow-hash")]
pub fn read_hash(data: &[u8], offset: usize) -> Result<ContentHash> {
    Ok(window(data, offset, HASH_BYTES)?.get_u16_le())
}

pub fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    window(data, offset, len)
}
