use crate::error::Result;

/// Compression primitive used by the framer.
///
/// Each `Codec` implementation:
/// - Is identified by a stable numeric `id()` stored in the stream header.
/// - Compresses every block independently: no state crosses block boundaries.
/// - Is deterministic and never writes more than `max_compressed_len(n)`
///   bytes for an `n`-byte input. The writer sizes its scratch buffer from
///   this bound once and reuses it for every block.
pub trait Codec: Send + Sync {
    /// Stable codec ID stored in the stream header.
    fn id(&self) -> u16;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Upper bound on the compressed size of `raw_len` input bytes.
    fn max_compressed_len(&self, raw_len: usize) -> usize;

    /// Compress `raw` into the front of `dst` and return the compressed size.
    ///
    /// `dst` is at least `max_compressed_len(raw.len())` bytes long.
    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize>;

    /// Size `compressed` will decompress to, read without decompressing.
    ///
    /// Implementations return a format error when the payload is too short
    /// to carry that information.
    fn decompressed_len(&self, compressed: &[u8]) -> Result<usize>;

    /// Decompress `compressed` into the front of `dst` and return the number
    /// of bytes produced.
    ///
    /// `dst` is exactly `decompressed_len(compressed)` bytes long. Corrupt or
    /// truncated input must fail with a format error.
    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize>;
}
