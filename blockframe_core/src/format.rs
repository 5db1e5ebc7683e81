use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Magic bytes opening every blockframe stream.
/// The leading 0x82 keeps the header from being mistaken for text.
pub const MAGIC: &[u8; 8] = b"\x82BLKFRM\x00";

/// Format version written by this crate.
pub const VERSION: u32 = 1;

/// Oldest reader version able to decode streams written by this crate.
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

/// Fixed size of the stream header in bytes.
///   magic[8] + version:u32 + min_compatible_version:u32
///   + codec_id:u16 + reserved:u16
///   = 8 + 4 + 4 + 2 + 2 = 20
pub const HEADER_SIZE: usize = 20;

/// Size of the big-endian length prefix in front of every block payload.
pub const BLOCK_LEN_SIZE: usize = 4;

/// Default block size: 32 KB.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Largest block size a writer accepts and a reader will decode into.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

// ── Codec IDs ──────────────────────────────────────────────────────────────

pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_ZSTD: u16 = 1;
pub const CODEC_LZ4: u16 = 2;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 20-byte stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub min_compatible_version: u32,
    pub codec_id: u16,
}

impl Header {
    /// Header for a stream written by this version of the crate.
    pub fn current(codec_id: u16) -> Self {
        Self {
            version: VERSION,
            min_compatible_version: MIN_COMPATIBLE_VERSION,
            codec_id,
        }
    }

    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_be_bytes());
        buf[12..16].copy_from_slice(&self.min_compatible_version.to_be_bytes());
        buf[16..18].copy_from_slice(&self.codec_id.to_be_bytes());
        // reserved[2] stays zero
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic and that
    /// this crate is new enough to decode the stream.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &buf[..8] != MAGIC {
            return Err(Error::format("invalid magic bytes, not a blockframe stream"));
        }
        let header = Self {
            version: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            min_compatible_version: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            codec_id: u16::from_be_bytes([buf[16], buf[17]]),
        };
        if header.min_compatible_version > VERSION {
            return Err(Error::format(format!(
                "stream version {} requires a reader of at least version {}, this is version {}",
                header.version, header.min_compatible_version, VERSION
            )));
        }
        Ok(header)
    }

    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read and validate a header. A source shorter than the header is a
    /// format error, not an I/O error.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        source.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Error::format("stream ended inside the header")
            }
            _ => Error::Io(e),
        })?;
        Self::from_bytes(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian() {
        let bytes = Header::current(0x0102).to_bytes();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 1]);
        assert_eq!(&bytes[16..18], &[1, 2]);
        assert_eq!(&bytes[18..20], &[0, 0]);
    }

    #[test]
    fn header_decodes_what_it_encodes() {
        let header = Header::current(CODEC_LZ4);
        assert_eq!(Header::from_bytes(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = Header::current(CODEC_ZSTD).to_bytes();
        bytes[1] = b'X';
        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(err.is_format(), "got {err}");
    }

    #[test]
    fn newer_incompatible_version_is_rejected() {
        let header = Header {
            version: 7,
            min_compatible_version: 5,
            codec_id: CODEC_PASSTHROUGH,
        };
        let err = Header::from_bytes(&header.to_bytes()).unwrap_err();
        assert!(err.to_string().contains("at least version 5"), "got {err}");
    }

    #[test]
    fn newer_but_compatible_version_is_accepted() {
        let header = Header {
            version: 3,
            min_compatible_version: 1,
            codec_id: CODEC_PASSTHROUGH,
        };
        assert_eq!(Header::from_bytes(&header.to_bytes()).unwrap().version, 3);
    }

    #[test]
    fn short_header_is_a_format_error() {
        let bytes = Header::current(CODEC_ZSTD).to_bytes();
        let mut src = &bytes[..HEADER_SIZE - 1];
        let err = Header::read_from(&mut src).unwrap_err();
        assert!(err.is_format(), "got {err}");
    }
}
