use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::codec::Codec;
use crate::element::{byte_range, Element};
use crate::error::{Error, Result};
use crate::format::{Header, BLOCK_LEN_SIZE, DEFAULT_BLOCK_SIZE, HEADER_SIZE, MAX_BLOCK_SIZE};

/// Runtime settings for a [`Writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Raw bytes gathered before a block is compressed and emitted.
    pub block_size: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Running totals for a writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Blocks emitted to the sink.
    pub blocks: u64,
    /// Raw bytes accepted from the caller.
    pub raw_bytes: u64,
    /// Bytes written to the sink, header and length prefixes included.
    pub framed_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Broken,
    Closed,
}

/// Streaming block-compression writer.
///
/// # Write contract
/// The header is written as soon as the writer is constructed. Input is
/// gathered into a `block_size` buffer; every time the buffer fills up it is
/// compressed and emitted as one block. [`flush`](Writer::flush) emits a
/// partial block, [`close`](Writer::close) emits whatever is left and
/// releases the sink. An empty buffer never produces a block.
///
/// # Format layout written
/// ```text
/// [HEADER: 20 bytes]
/// [LEN 0: u32 BE] [PAYLOAD 0] [LEN 1: u32 BE] [PAYLOAD 1] ...
/// ```
///
/// Dropping a writer that was never closed closes it; failures at that point
/// can only be logged, so call `close` or `finish` to observe them.
pub struct Writer<W: Write> {
    sink: Option<W>,
    codec: Box<dyn Codec>,
    /// Pending raw bytes; `cursor` marks the first free slot.
    uncompressed: Vec<u8>,
    cursor: usize,
    /// Scratch output sized to the codec's worst case for a full block.
    compressed: Vec<u8>,
    state: State,
    stats: WriterStats,
}

impl<W: Write> Writer<W> {
    /// Create a writer with [`DEFAULT_BLOCK_SIZE`] (32 KB) blocks.
    pub fn new(sink: W, codec: Box<dyn Codec>) -> Result<Self> {
        Self::with_block_size(sink, codec, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_options(sink: W, codec: Box<dyn Codec>, options: &WriterOptions) -> Result<Self> {
        Self::with_block_size(sink, codec, options.block_size)
    }

    /// Create a writer and emit the stream header to `sink`.
    ///
    /// `block_size` must lie in `1..=MAX_BLOCK_SIZE`.
    pub fn with_block_size(mut sink: W, codec: Box<dyn Codec>, block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(Error::config(format!(
                "block size {} outside 1..={}",
                block_size, MAX_BLOCK_SIZE
            )));
        }

        Header::current(codec.id()).write_to(&mut sink)?;

        let scratch_len = codec.max_compressed_len(block_size);
        debug!(codec = codec.name(), block_size, scratch_len, "opened blockframe writer");

        Ok(Self {
            sink: Some(sink),
            codec,
            uncompressed: vec![0u8; block_size],
            cursor: 0,
            compressed: vec![0u8; scratch_len],
            state: State::Open,
            stats: WriterStats {
                framed_bytes: HEADER_SIZE as u64,
                ..WriterStats::default()
            },
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.uncompressed.len()
    }

    /// Raw bytes waiting for the next block.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.cursor
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// The sink, unless the writer has been closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Append `buffer[byte_offset..byte_offset + byte_length]`, emitting a
    /// block each time the buffer fills up.
    pub fn write_bytes(&mut self, buffer: &[u8], byte_offset: usize, byte_length: usize) -> Result<()> {
        self.check_open()?;
        let end = byte_offset
            .checked_add(byte_length)
            .filter(|&end| end <= buffer.len())
            .ok_or_else(|| {
                Error::config(format!(
                    "byte range {}+{} outside a {}-byte buffer",
                    byte_offset,
                    byte_length,
                    buffer.len()
                ))
            })?;

        let mut src = &buffer[byte_offset..end];
        while !src.is_empty() {
            let n = (self.uncompressed.len() - self.cursor).min(src.len());
            self.uncompressed[self.cursor..self.cursor + n].copy_from_slice(&src[..n]);
            self.cursor += n;
            self.stats.raw_bytes += n as u64;
            src = &src[n..];

            if self.cursor == self.uncompressed.len() {
                self.dump()?;
            }
        }
        Ok(())
    }

    pub fn write_byte(&mut self, b: u8) -> Result<()> {
        self.check_open()?;
        if self.cursor == self.uncompressed.len() {
            self.dump()?;
        }
        self.uncompressed[self.cursor] = b;
        self.cursor += 1;
        self.stats.raw_bytes += 1;
        Ok(())
    }

    /// Append `count` elements of `array` starting at element `offset`, as
    /// raw native-layout bytes.
    pub fn write_elements<T: Element>(&mut self, array: &[T], offset: usize, count: usize) -> Result<()> {
        let (byte_offset, byte_length) = byte_range::<T>(array.len(), offset, count).ok_or_else(|| {
            Error::config(format!(
                "element range {}+{} outside a {}-element array",
                offset,
                count,
                array.len()
            ))
        })?;
        self.write_bytes(bytemuck::cast_slice(array), byte_offset, byte_length)
    }

    pub fn write_all_elements<T: Element>(&mut self, array: &[T]) -> Result<()> {
        self.write_elements(array, 0, array.len())
    }

    pub fn write_i16s(&mut self, array: &[i16], offset: usize, count: usize) -> Result<()> {
        self.write_elements(array, offset, count)
    }

    pub fn write_i32s(&mut self, array: &[i32], offset: usize, count: usize) -> Result<()> {
        self.write_elements(array, offset, count)
    }

    pub fn write_i64s(&mut self, array: &[i64], offset: usize, count: usize) -> Result<()> {
        self.write_elements(array, offset, count)
    }

    pub fn write_f32s(&mut self, array: &[f32], offset: usize, count: usize) -> Result<()> {
        self.write_elements(array, offset, count)
    }

    pub fn write_f64s(&mut self, array: &[f64], offset: usize, count: usize) -> Result<()> {
        self.write_elements(array, offset, count)
    }

    /// Emit any buffered bytes as a (possibly partial) block, then flush the
    /// sink.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.dump()?;
        let result = self.sink_mut()?.flush();
        self.mark_broken_on_err(result)
    }

    /// Flush remaining data and release the sink.
    ///
    /// Closing an already closed writer is a no-op. Closing a broken writer
    /// drops the sink without emitting anything.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Closed => return Ok(()),
            State::Broken => {
                self.state = State::Closed;
                self.sink = None;
                return Ok(());
            }
            State::Open => {}
        }

        let result = self.flush();
        self.state = State::Closed;
        self.sink = None;
        debug!(
            blocks = self.stats.blocks,
            raw_bytes = self.stats.raw_bytes,
            framed_bytes = self.stats.framed_bytes,
            "closed blockframe writer"
        );
        result
    }

    /// Flush remaining data and hand the sink back instead of dropping it.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        self.state = State::Closed;
        self.sink.take().ok_or(Error::Closed)
    }

    /// Compress `uncompressed[..cursor]` and emit it as one block.
    fn dump(&mut self) -> Result<()> {
        if self.cursor == 0 {
            return Ok(());
        }

        let raw = &self.uncompressed[..self.cursor];
        let compressed_len = self.codec.compress_into(raw, &mut self.compressed)?;
        if compressed_len > self.compressed.len() || compressed_len > u32::MAX as usize {
            return Err(Error::Codec {
                codec: self.codec.name(),
                reason: format!(
                    "compressed size {} exceeds the declared bound {}",
                    compressed_len,
                    self.compressed.len()
                ),
            });
        }

        let sink = self.sink.as_mut().ok_or(Error::Closed)?;
        let result = sink
            .write_all(&(compressed_len as u32).to_be_bytes())
            .and_then(|_| sink.write_all(&self.compressed[..compressed_len]));
        self.mark_broken_on_err(result)?;

        trace!(
            block = self.stats.blocks,
            raw_len = self.cursor,
            compressed_len,
            "emitted block"
        );
        self.stats.blocks += 1;
        self.stats.framed_bytes += (BLOCK_LEN_SIZE + compressed_len) as u64;
        self.cursor = 0;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Broken => Err(Error::Broken),
            State::Closed => Err(Error::Closed),
        }
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or(Error::Closed)
    }

    fn mark_broken_on_err<T>(&mut self, result: io::Result<T>) -> Result<T> {
        result.map_err(|e| {
            self.state = State::Broken;
            Error::Io(e)
        })
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf, 0, buf.len())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Writer::flush(self)?;
        Ok(())
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.state == State::Open {
            if let Err(err) = self.close() {
                warn!(error = %err, "closing blockframe writer on drop failed");
            }
        }
    }
}
