use thiserror::Error;
use wirepack_buffers::BufferError;

/// Decode and encode failures across all format drivers.
///
/// Offsets count bytes consumed from the start of the input. A decoder that
/// has returned an error is tainted; resume by building a fresh decoder
/// from the handle.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("input truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("malformed input: descriptor 0x{bd:02x} at byte {offset}")]
    Malformed { bd: u8, offset: usize },
    #[error("{what} overflows the requested type at byte {offset}")]
    Overflow { what: &'static str, offset: usize },
    #[error("invalid utf-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("extension tag mismatch: expected {expected}, found {actual}")]
    WrongExtTag { expected: u64, actual: u64 },
    #[error("announced length {announced} does not match actual {actual}")]
    LengthMismatch { announced: usize, actual: usize },
    #[error("container nesting exceeds the configured maximum depth")]
    DepthExceeded,
    #[error("duplicate extension tag {0}")]
    DuplicateExtTag(u64),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("invalid timestamp: {0}")]
    Time(String),
    #[error("codec invariant violated: {0}")]
    Internal(&'static str),
    #[error("read failed at byte {offset}: {source}")]
    Io {
        offset: usize,
        #[source]
        source: std::io::Error,
    },
}

impl From<BufferError> for CodecError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::EndOfInput(offset) => CodecError::Truncated { offset },
            BufferError::InvalidUtf8(offset) => CodecError::InvalidUtf8 { offset },
            BufferError::Io { offset, source } => CodecError::Io { offset, source },
        }
    }
}
