use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Per-bucket compression codec, recorded in each index file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    None,
    Lz4,      // fastest, ratio 2-3x
    Zstd,     // best ratio, slower
    Snappy,   // between the two
}

const ZSTD_LEVEL: i32 = 3;

impl Codec {
    /// Header byte for this codec.
    pub fn tag(self) -> u8 {
        match self {
            Codec::None => b'N',
            Codec::Lz4 => b'L',
            Codec::Zstd => b'Z',
            Codec::Snappy => b'S',
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            b'N' => Ok(Codec::None),
            b'L' => Ok(Codec::Lz4),
            b'Z' => Ok(Codec::Zstd),
            b'S' => Ok(Codec::Snappy),
            other => Err(Error::corrupt(format!("unknown codec tag 0x{:02x}", other))),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let out = match self {
            Codec::None => data.to_vec(),
            Codec::Lz4 => lz4_flex::block::compress_prepend_size(data),
            Codec::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL)?,
            Codec::Snappy => snap::raw::Encoder::new().compress_vec(data)?,
        };
        Ok(out)
    }

    /// Decompress a payload, refusing anything that would expand past
    /// `max_len` bytes.
    pub fn decompress(self, data: &[u8], max_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.decompress_into(data, max_len, &mut out)?;
        Ok(out)
    }

    /// Like `decompress`, but reuses `out`. Its capacity is kept, so a
    /// buffer reserved for `max_len` bytes is never reallocated.
    pub fn decompress_into(self, data: &[u8], max_len: usize, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        if data.is_empty() {
            return Ok(());
        }
        match self {
            Codec::None => {
                check_len(data.len(), max_len)?;
                out.extend_from_slice(data);
            }
            Codec::Lz4 => {
                let (declared, body) = match data.split_first_chunk::<4>() {
                    Some((len, body)) => (u32::from_le_bytes(*len) as usize, body),
                    None => return Err(Error::corrupt("lz4 payload truncated")),
                };
                check_len(declared, max_len)?;
                out.resize(declared, 0);
                let n = lz4_flex::block::decompress_into(body, out)?;
                out.truncate(n);
            }
            Codec::Zstd => {
                out.reserve(max_len);
                zstd::bulk::Decompressor::new()?
                    .decompress_to_buffer(data, out)
                    .map_err(|e| Error::corrupt(format!("zstd: {}", e)))?;
            }
            Codec::Snappy => {
                let len = snap::raw::decompress_len(data)?;
                check_len(len, max_len)?;
                out.resize(len, 0);
                let n = snap::raw::Decoder::new().decompress(data, out)?;
                out.truncate(n);
            }
        }
        check_len(out.len(), max_len)
    }
}

fn check_len(len: usize, max_len: usize) -> Result<()> {
    if len > max_len {
        return Err(Error::corrupt(format!(
            "bucket expands to {} bytes, header allows {}",
            len, max_len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    const ALL: [Codec; 4] = [Codec::None, Codec::Lz4, Codec::Zstd, Codec::Snappy];

    fn sample() -> Vec<u8> {
        b"glean glean glean index bucket payload ".repeat(64)
    }

    #[test]
    fn tags_roundtrip() {
        for codec in ALL {
            assert_eq!(Codec::from_tag(codec.tag()).unwrap(), codec);
        }
        assert_eq!(Codec::from_tag(b'?').unwrap_err().kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn every_codec_restores_payload() {
        let data = sample();
        for codec in ALL {
            let packed = codec.compress(&data).unwrap();
            assert_eq!(codec.decompress(&packed, data.len()).unwrap(), data, "{codec:?}");
        }
    }

    #[test]
    fn oversize_payload_is_corrupt() {
        let data = sample();
        for codec in ALL {
            let packed = codec.compress(&data).unwrap();
            let err = codec.decompress(&packed, data.len() - 1).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Corrupt, "{codec:?}");
        }
    }

    #[test]
    fn scratch_buffer_is_reused() {
        let data = sample();
        for codec in ALL {
            let packed = codec.compress(&data).unwrap();
            let mut scratch = Vec::with_capacity(data.len());
            let cap = scratch.capacity();
            for _ in 0..3 {
                codec.decompress_into(&packed, data.len(), &mut scratch).unwrap();
                assert_eq!(scratch, data, "{codec:?}");
                assert_eq!(scratch.capacity(), cap, "{codec:?}");
            }
        }
    }

    #[test]
    fn empty_stays_empty() {
        for codec in ALL {
            assert!(codec.compress(&[]).unwrap().is_empty());
            assert!(codec.decompress(&[], 0).unwrap().is_empty());
        }
    }
}
