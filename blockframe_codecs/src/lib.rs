mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use std::io::Read;
use std::sync::Arc;

use blockframe_core::format::{CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_ZSTD};
use blockframe_core::{Codec, Error, Header, Reader, Result};

/// Bytes of the little-endian raw-length prefix every bundled codec puts in
/// front of its compressed data.
pub(crate) const RAW_LEN_SIZE: usize = 4;

/// Resolve a codec from its on-stream `codec_id`.
///
/// Called by the CLI when opening an existing stream, so the reader can be
/// initialized with the right codec automatically.
pub fn codec_by_id(id: u16) -> Result<Arc<dyn Codec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassThroughCodec)),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        _ => Err(Error::format(format!(
            "unknown codec id {}; supported: 0 (passthrough), 1 (zstd), 2 (lz4)",
            id
        ))),
    }
}

/// Read the header of `source`, pick the matching bundled codec, and return a
/// reader positioned at the first block.
pub fn open_reader<R: Read>(mut source: R) -> Result<Reader<R>> {
    let header = Header::read_from(&mut source)?;
    let codec = codec_by_id(header.codec_id)?;
    Reader::from_parts(source, header, codec)
}

/// Write `raw_len` as the payload prefix and return the rest of `dst`.
pub(crate) fn put_raw_len(raw_len: usize, dst: &mut [u8]) -> &mut [u8] {
    dst[..RAW_LEN_SIZE].copy_from_slice(&(raw_len as u32).to_le_bytes());
    &mut dst[RAW_LEN_SIZE..]
}

/// Split a payload into its declared raw length and the compressed body.
pub(crate) fn take_raw_len<'a>(codec: &str, compressed: &'a [u8]) -> Result<(usize, &'a [u8])> {
    if compressed.len() < RAW_LEN_SIZE {
        return Err(Error::format(format!(
            "{} payload of {} bytes is too short for its length prefix",
            codec,
            compressed.len()
        )));
    }
    let (prefix, body) = compressed.split_at(RAW_LEN_SIZE);
    let raw_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    Ok((raw_len, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bundled_id_resolves() {
        for id in [CODEC_PASSTHROUGH, CODEC_ZSTD, CODEC_LZ4] {
            assert_eq!(codec_by_id(id).unwrap().id(), id);
        }
    }

    #[test]
    fn unknown_id_is_a_format_error() {
        let err = codec_by_id(99).err().unwrap();
        assert!(err.is_format(), "got {err}");
    }

    #[test]
    fn short_prefix_is_rejected() {
        assert!(take_raw_len("test", &[1, 0]).is_err());
        let (len, body) = take_raw_len("test", &[5, 0, 0, 0, 9]).unwrap();
        assert_eq!((len, body), (5, &[9u8][..]));
    }
}
