use thiserror::Error;

/// Errors surfaced by the byte-level readers.
///
/// Offsets count bytes consumed from the start of the input, so a decoder
/// sitting on top can report where a document went bad.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("unexpected end of input at byte {0}")]
    EndOfInput(usize),
    #[error("invalid utf-8 in input at byte {0}")]
    InvalidUtf8(usize),
    #[error("read failed at byte {offset}: {source}")]
    Io {
        offset: usize,
        #[source]
        source: std::io::Error,
    },
}

impl BufferError {
    /// Byte offset at which the failure was detected.
    pub fn offset(&self) -> usize {
        match self {
            BufferError::EndOfInput(at) => *at,
            BufferError::InvalidUtf8(at) => *at,
            BufferError::Io { offset, .. } => *offset,
        }
    }
}
