//! Helpers shared by the unit tests of this crate.

use std::io::{self, Write};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{BLOCK_LEN_SIZE, HEADER_SIZE};

/// Identity codec: the payload is the raw block itself.
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn id(&self) -> u16 {
        0x7e57
    }

    fn name(&self) -> &'static str {
        "identity"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        raw_len
    }

    fn compress_into(&self, raw: &[u8], dst: &mut [u8]) -> Result<usize> {
        dst[..raw.len()].copy_from_slice(raw);
        Ok(raw.len())
    }

    fn decompressed_len(&self, compressed: &[u8]) -> Result<usize> {
        Ok(compressed.len())
    }

    fn decompress_into(&self, compressed: &[u8], dst: &mut [u8]) -> Result<usize> {
        if dst.len() != compressed.len() {
            return Err(Error::format("identity payload size mismatch"));
        }
        dst.copy_from_slice(compressed);
        Ok(compressed.len())
    }
}

/// Split a framed stream into its block payloads, skipping the header.
pub fn split_blocks(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut rest = &stream[HEADER_SIZE..];
    let mut blocks = Vec::new();
    while !rest.is_empty() {
        let len = u32::from_be_bytes(rest[..BLOCK_LEN_SIZE].try_into().unwrap()) as usize;
        rest = &rest[BLOCK_LEN_SIZE..];
        blocks.push(rest[..len].to_vec());
        rest = &rest[len..];
    }
    blocks
}

/// Sink that accepts `budget` bytes and then fails every write.
pub struct FailingSink {
    pub written: Vec<u8>,
    pub budget: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone"));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory sink that counts how often it was flushed.
#[derive(Default)]
pub struct RecordingSink {
    pub written: Vec<u8>,
    pub flushes: usize,
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
