use blockframe_core::codec::Codec;
use blockframe_core::format::CODEC_ZSTD;
use blockframe_core::{Error, Result};

use crate::{put_raw_len, take_raw_len, RAW_LEN_SIZE};

/// Zstandard block codec.
///
/// Each block is compressed independently with `zstd` at the configured level
/// (default: 3). Best for general text, JSON, logs, mixed structured data.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        RAW_LEN_SIZE + zstd::zstd_safe::compress_bound(raw_len)
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize> {
        let body = put_raw_len(raw.len(), dst);
        let n = zstd::bulk::compress_to_buffer(raw, body, self.level).map_err(|e| Error::Codec {
            codec: "zstd",
            reason: e.to_string(),
        })?;
        Ok(RAW_LEN_SIZE + n)
    }

    fn decompressed_len(&self, compressed: &[u8]) -> Result<usize> {
        take_raw_len(self.name(), compressed).map(|(len, _)| len)
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize> {
        let (_, body) = take_raw_len(self.name(), compressed)?;
        zstd::bulk::decompress_to_buffer(body, dst)
            .map_err(|e| Error::format(format!("zstd decompress error: {}", e)))
    }
}
