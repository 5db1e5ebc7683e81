use blockframe_core::codec::Codec;
use blockframe_core::format::CODEC_LZ4;
use blockframe_core::{Error, Result};

use crate::{put_raw_len, take_raw_len, RAW_LEN_SIZE};

/// LZ4 block codec.
///
/// Fastest decompression of all bundled codecs. Best for hot data and
/// low-latency pipelines where decode speed matters more than size reduction.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> u16 {
        CODEC_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        RAW_LEN_SIZE + lz4_flex::block::get_maximum_output_size(raw_len)
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize> {
        let body = put_raw_len(raw.len(), dst);
        let n = lz4_flex::block::compress_into(raw, body).map_err(|e| Error::Codec {
            codec: "lz4",
            reason: e.to_string(),
        })?;
        Ok(RAW_LEN_SIZE + n)
    }

    fn decompressed_len(&self, compressed: &[u8]) -> Result<usize> {
        take_raw_len(self.name(), compressed).map(|(len, _)| len)
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize> {
        let (_, body) = take_raw_len(self.name(), compressed)?;
        lz4_flex::block::decompress_into(body, dst)
            .map_err(|e| Error::format(format!("lz4 decompress error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compresses_repetitive_input_within_the_bound() {
        let raw = vec![b'a'; 4096];
        let mut dst = vec![0u8; Lz4Codec.max_compressed_len(raw.len())];
        let n = Lz4Codec.compress_into(&raw, &mut dst).unwrap();
        assert!(n < raw.len());

        let mut out = vec![0u8; Lz4Codec.decompressed_len(&dst[..n]).unwrap()];
        assert_eq!(Lz4Codec.decompress_into(&dst[..n], &mut out).unwrap(), raw.len());
        assert_eq!(out, raw);
    }

    #[test]
    fn incompressible_input_fits_the_bound() {
        let raw: Vec<u8> = (0..2048u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        let mut dst = vec![0u8; Lz4Codec.max_compressed_len(raw.len())];
        assert!(Lz4Codec.compress_into(&raw, &mut dst).is_ok());
    }
}
