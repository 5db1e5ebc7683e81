//! Error types for framing, codec, and sink/source failures.

use thiserror::Error;

/// Every fallible operation in this crate returns this error.
///
/// Once a [`Writer`](crate::Writer) or [`Reader`](crate::Reader) has returned
/// `Io` or `Format`, the stream must be treated as unusable: nothing written
/// before the failure is rolled back.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid block size or an out-of-range buffer argument.
    #[error("configuration error: {0}")]
    Config(String),

    /// The underlying sink or source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a well-formed blockframe stream.
    #[error("format error: {0}")]
    Format(String),

    /// The compression primitive rejected a block.
    #[error("{codec} codec error: {reason}")]
    Codec { codec: &'static str, reason: String },

    /// The writer was already closed.
    #[error("writer is closed")]
    Closed,

    /// An earlier failure left the writer or reader in an undefined state.
    #[error("stream is broken by an earlier failure")]
    Broken,
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Shorthand used by codecs and the reader for malformed input.
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Format(_) => std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            Error::Config(_) => std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
