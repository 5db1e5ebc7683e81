use blockframe_core::codec::Codec;
use blockframe_core::format::CODEC_PASSTHROUGH;
use blockframe_core::{Error, Result};

use crate::{put_raw_len, take_raw_len, RAW_LEN_SIZE};

/// No-op codec: stores blocks verbatim, with no compression.
///
/// Useful for:
/// - Verifying the framing round-trip independently of any codec.
/// - Data that is already compressed (e.g., JPEG, MP4) where further
///   compression would expand the stream.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        RAW_LEN_SIZE + raw_len
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize> {
        let body = put_raw_len(raw.len(), dst);
        body[..raw.len()].copy_from_slice(raw);
        Ok(RAW_LEN_SIZE + raw.len())
    }

    fn decompressed_len(&self, compressed: &[u8]) -> Result<usize> {
        take_raw_len(self.name(), compressed).map(|(len, _)| len)
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize> {
        let (_, body) = take_raw_len(self.name(), compressed)?;
        if body.len() != dst.len() {
            return Err(Error::format(format!(
                "passthrough payload holds {} bytes but declares {}",
                body.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(body);
        Ok(body.len())
    }
}
