pub mod codec;
pub mod element;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod testing;

pub use codec::Codec;
pub use element::Element;
pub use error::{Error, Result};
pub use format::{Header, DEFAULT_BLOCK_SIZE, HEADER_SIZE, MAGIC, MAX_BLOCK_SIZE};
pub use reader::Reader;
pub use writer::{Writer, WriterOptions, WriterStats};
