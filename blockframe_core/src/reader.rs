use std::io::{self, BufRead, Read};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::codec::Codec;
use crate::element::{byte_range, Element};
use crate::error::{Error, Result};
use crate::format::{Header, BLOCK_LEN_SIZE, MAX_BLOCK_SIZE};

/// Sequential reader for blockframe streams.
///
/// # Open sequence
/// The 20-byte header is read and validated up front (magic, version
/// compatibility, codec id). Blocks are then decoded one at a time, in the
/// order they were written.
///
/// # Access pattern
/// [`next_block`](Reader::next_block) decodes the next block and returns a
/// view of it. The [`Read`] and [`BufRead`] impls drain that view and pull the
/// next block only once the current one is exhausted, so the whole stream
/// reads as the original byte sequence.
///
/// # Damage detection
/// Blocks carry no checksum. A damaged block is caught only when its length
/// field, its payload size, or the codec rejects it, which may happen one or
/// more blocks after the damage. Blocks returned before an error may
/// therefore already hold corrupt bytes. After any error the reader is broken
/// and every further `next_block` fails with [`Error::Broken`].
pub struct Reader<R: Read> {
    source: R,
    header: Header,
    codec: Arc<dyn Codec>,
    compressed: Vec<u8>,
    uncompressed: Vec<u8>,
    /// Drain cursor within `uncompressed[..len]`.
    pos: usize,
    len: usize,
    max_payload: usize,
    blocks_read: u64,
    broken: bool,
}

impl<R: Read> Reader<R> {
    /// Read the header from `source` and check it against `codec`.
    pub fn new(mut source: R, codec: Arc<dyn Codec>) -> Result<Self> {
        let header = Header::read_from(&mut source)?;
        Self::from_parts(source, header, codec)
    }

    /// Build a reader over a source whose header was already consumed.
    pub fn from_parts(source: R, header: Header, codec: Arc<dyn Codec>) -> Result<Self> {
        if header.codec_id != codec.id() {
            return Err(Error::format(format!(
                "codec mismatch: stream uses codec {} but provided codec has id {}",
                header.codec_id,
                codec.id()
            )));
        }
        debug!(codec = codec.name(), version = header.version, "opened blockframe reader");

        let max_payload = codec.max_compressed_len(MAX_BLOCK_SIZE);
        Ok(Self {
            source,
            header,
            codec,
            compressed: Vec::new(),
            uncompressed: Vec::new(),
            pos: 0,
            len: 0,
            max_payload,
            blocks_read: 0,
            broken: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Blocks decoded so far.
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Compressed payload of the most recently decoded block.
    pub fn payload(&self) -> &[u8] {
        &self.compressed
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Decode the next block.
    ///
    /// Returns `Ok(None)` when the source ends cleanly on a block boundary.
    /// Any undrained bytes of the previous block are discarded.
    pub fn next_block(&mut self) -> Result<Option<&[u8]>> {
        if self.broken {
            return Err(Error::Broken);
        }
        self.pos = 0;
        self.len = 0;

        match self.decode_block() {
            Ok(Some(raw_len)) => Ok(Some(&self.uncompressed[..raw_len])),
            Ok(None) => Ok(None),
            Err(err) => {
                self.broken = true;
                Err(err)
            }
        }
    }

    /// Read and decompress one block into `uncompressed`, returning its size.
    fn decode_block(&mut self) -> Result<Option<usize>> {
        let payload_len = match self.read_block_len()? {
            Some(len) => len as usize,
            None => return Ok(None),
        };
        if payload_len == 0 {
            return Err(Error::format(format!("block {} has a zero length", self.blocks_read)));
        }
        if payload_len > self.max_payload {
            return Err(Error::format(format!(
                "block {} length {} exceeds the maximum {}",
                self.blocks_read, payload_len, self.max_payload
            )));
        }

        self.compressed.resize(payload_len, 0);
        self.source.read_exact(&mut self.compressed).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::format(format!(
                "stream truncated inside block {} ({} payload bytes expected)",
                self.blocks_read, payload_len
            )),
            _ => Error::Io(e),
        })?;

        let raw_len = self.codec.decompressed_len(&self.compressed)?;
        if raw_len == 0 || raw_len > MAX_BLOCK_SIZE {
            return Err(Error::format(format!(
                "block {} declares {} raw bytes, outside 1..={}",
                self.blocks_read, raw_len, MAX_BLOCK_SIZE
            )));
        }
        if self.uncompressed.len() < raw_len {
            self.uncompressed.resize(raw_len, 0);
        }

        let produced = self
            .codec
            .decompress_into(&self.compressed, &mut self.uncompressed[..raw_len])?;
        if produced != raw_len {
            return Err(Error::format(format!(
                "block {} decompressed to {} bytes but declares {}",
                self.blocks_read, produced, raw_len
            )));
        }

        trace!(block = self.blocks_read, compressed_len = payload_len, raw_len, "decoded block");
        self.blocks_read += 1;
        self.len = raw_len;
        Ok(Some(raw_len))
    }

    /// Fill `dst[offset..offset + len]` from the stream.
    ///
    /// Returns the number of bytes read, which is short of `len` only when
    /// the stream ends.
    pub fn read_bytes(&mut self, dst: &mut [u8], offset: usize, len: usize) -> Result<usize> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= dst.len())
            .ok_or_else(|| {
                Error::config(format!(
                    "byte range {}+{} outside a {}-byte buffer",
                    offset,
                    len,
                    dst.len()
                ))
            })?;

        let mut filled = offset;
        while filled < end {
            let chunk = self.available()?;
            if chunk.is_empty() {
                break;
            }
            let n = chunk.len().min(end - filled);
            dst[filled..filled + n].copy_from_slice(&chunk[..n]);
            self.pos += n;
            filled += n;
        }
        Ok(filled - offset)
    }

    /// Fill `count` elements of `dst` starting at element `offset` with raw
    /// native-layout bytes from the stream. Returns the number of elements
    /// read.
    pub fn read_elements<T: Element>(&mut self, dst: &mut [T], offset: usize, count: usize) -> Result<usize> {
        let (byte_offset, byte_length) = byte_range::<T>(dst.len(), offset, count).ok_or_else(|| {
            Error::config(format!(
                "element range {}+{} outside a {}-element array",
                offset,
                count,
                dst.len()
            ))
        })?;
        let read = self.read_bytes(bytemuck::cast_slice_mut(dst), byte_offset, byte_length)?;
        if read % T::WIDTH != 0 {
            return Err(Error::format(format!(
                "stream ended inside a {}-byte element",
                T::WIDTH
            )));
        }
        Ok(read / T::WIDTH)
    }

    /// Undrained bytes of the current block, decoding the next block when
    /// the current one is exhausted. Empty at end of stream.
    fn available(&mut self) -> Result<&[u8]> {
        if self.pos == self.len && self.next_block()?.is_none() {
            return Ok(&[]);
        }
        Ok(&self.uncompressed[self.pos..self.len])
    }

    /// Read the 4-byte big-endian block length. `None` on a clean end of
    /// stream; a partial length field is a format error.
    fn read_block_len(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; BLOCK_LEN_SIZE];
        let mut filled = 0;
        while filled < BLOCK_LEN_SIZE {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        match filled {
            0 => Ok(None),
            BLOCK_LEN_SIZE => Ok(Some(u32::from_be_bytes(buf))),
            n => Err(Error::format(format!(
                "stream ended after {} of {} length bytes",
                n, BLOCK_LEN_SIZE
            ))),
        }
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        Ok(self.read_bytes(buf, 0, len)?)
    }
}

impl<R: Read> BufRead for Reader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.available()?)
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{HEADER_SIZE, CODEC_ZSTD};
    use crate::testing::IdentityCodec;
    use crate::writer::Writer;

    fn framed(data: &[u8], block_size: usize) -> Vec<u8> {
        let mut w = Writer::with_block_size(Vec::new(), Box::new(IdentityCodec), block_size).unwrap();
        w.write_bytes(data, 0, data.len()).unwrap();
        w.finish().unwrap()
    }

    fn reader(stream: &[u8]) -> Result<Reader<&[u8]>> {
        Reader::new(stream, Arc::new(IdentityCodec))
    }

    #[test]
    fn blocks_come_back_in_write_order() {
        let stream = framed(&[1, 2, 3, 4, 5, 6, 7], 4);
        let mut r = reader(&stream).unwrap();
        assert_eq!(r.next_block().unwrap(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(r.next_block().unwrap(), Some(&[5u8, 6, 7][..]));
        assert_eq!(r.next_block().unwrap(), None);
        assert_eq!(r.next_block().unwrap(), None);
        assert_eq!(r.blocks_read(), 2);
    }

    #[test]
    fn header_only_stream_reads_empty() {
        let stream = framed(&[], 4);
        assert_eq!(stream.len(), HEADER_SIZE);
        let mut r = reader(&stream).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn codec_mismatch_is_a_format_error() {
        let mut stream = framed(b"abc", 4);
        stream[16..18].copy_from_slice(&CODEC_ZSTD.to_be_bytes());
        let err = reader(&stream).err().unwrap();
        assert!(err.to_string().contains("codec mismatch"), "got {err}");
    }

    #[test]
    fn truncated_payload_is_a_format_error() {
        let mut stream = framed(b"abcdef", 4);
        stream.pop();
        let mut r = reader(&stream).unwrap();
        assert!(r.next_block().unwrap().is_some());
        let err = r.next_block().unwrap_err();
        assert!(err.is_format(), "got {err}");
    }

    #[test]
    fn partial_length_field_is_a_format_error() {
        let mut stream = framed(b"abcd", 4);
        stream.extend_from_slice(&[0, 0]);
        let mut r = reader(&stream).unwrap();
        assert!(r.next_block().unwrap().is_some());
        let err = r.next_block().unwrap_err();
        assert!(err.to_string().contains("2 of 4 length bytes"), "got {err}");
    }

    #[test]
    fn zero_and_oversized_lengths_are_rejected() {
        let mut stream = framed(&[], 4);
        stream.extend_from_slice(&0u32.to_be_bytes());
        assert!(reader(&stream).unwrap().next_block().unwrap_err().is_format());

        let mut stream = framed(&[], 4);
        stream.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(reader(&stream).unwrap().next_block().unwrap_err().is_format());
    }

    #[test]
    fn io_read_drains_across_blocks() {
        let data: Vec<u8> = (0..100u8).collect();
        let stream = framed(&data, 7);
        let mut r = reader(&stream).unwrap();

        let mut head = [0u8; 10];
        r.read_exact(&mut head).unwrap();
        assert_eq!(&head[..], &data[..10]);

        let mut rest = Vec::new();
        r.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, data[10..].to_vec());
    }

    #[test]
    fn io_read_reports_truncation_as_invalid_data() {
        let mut stream = framed(&[9u8; 20], 8);
        stream.truncate(stream.len() - 1);
        let mut out = Vec::new();
        let err = reader(&stream).unwrap().read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_bytes_honours_offset_and_stops_at_end() {
        let stream = framed(b"hello", 2);
        let mut r = reader(&stream).unwrap();
        let mut dst = [0u8; 8];
        assert_eq!(r.read_bytes(&mut dst, 2, 6).unwrap(), 5);
        assert_eq!(&dst, b"\0\0hello\0");
        assert!(matches!(r.read_bytes(&mut dst, 7, 2), Err(Error::Config(_))));
    }

    #[test]
    fn read_elements_rejects_a_torn_element() {
        let stream = framed(&[1, 2, 3, 4, 5, 6], 4);
        let mut r = reader(&stream).unwrap();
        let mut dst = [0u32; 2];
        let err = r.read_elements(&mut dst, 0, 2).unwrap_err();
        assert!(err.is_format(), "got {err}");
    }

    #[test]
    fn reader_stays_broken_after_a_format_error() {
        let mut stream = framed(b"abcd", 4);
        stream.extend_from_slice(&0u32.to_be_bytes());
        stream.extend_from_slice(&framed(b"efgh", 4)[HEADER_SIZE..]);
        let mut r = reader(&stream).unwrap();
        assert!(r.next_block().unwrap().is_some());
        assert!(r.next_block().unwrap_err().is_format());
        assert!(matches!(r.next_block(), Err(Error::Broken)));
        assert!(matches!(r.next_block(), Err(Error::Broken)));
        assert_eq!(r.blocks_read(), 1);

        let mut out = Vec::new();
        let err = r.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(out.is_empty());
    }

    #[test]
    fn next_block_discards_the_undrained_rest() {
        let stream = framed(b"abcdefgh", 4);
        let mut r = reader(&stream).unwrap();
        let mut one = [0u8; 1];
        r.read_exact(&mut one).unwrap();
        assert_eq!(r.next_block().unwrap(), Some(&b"efgh"[..]));
    }
}
