//! Wire reading: the `WireRead` trait and the in-memory `SliceReader`.

use crate::BufferError;

/// Describes what backs a byte view handed out by a reader or decoder.
///
/// Views that are not `Detached` are only valid until the next read call on
/// the source that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesAttach {
    /// Freshly allocated copy owned by the caller.
    Detached,
    /// Aliases the reader's internal scratch buffer.
    Buffer,
    /// Aliases the caller-provided input buffer (zero copy).
    View,
    /// Written into a buffer the caller passed in.
    Param,
}

/// Byte-level input source for the format decoders.
///
/// All reads are big-endian-agnostic raw byte reads; fixed-width integer
/// assembly is the decoder's business. A failed read must not advance the
/// cursor, so a decoder can surface the error and still report an exact
/// offset via [`WireRead::numread`].
pub trait WireRead {
    /// Reads exactly `n` bytes and returns a view over them. What the view
    /// aliases is described by [`WireRead::view_attach`].
    fn readx(&mut self, n: usize) -> Result<&[u8], BufferError>;

    /// Backing store of the views returned by [`WireRead::readx`].
    fn view_attach(&self) -> BytesAttach;

    /// Discards `n` bytes. Skipped bytes still count as consumed and are
    /// captured by an active recording.
    fn skip(&mut self, n: usize) -> Result<(), BufferError>;

    /// Returns the next byte without consuming it.
    fn peek(&mut self) -> Result<u8, BufferError>;

    /// Total number of bytes consumed so far.
    fn numread(&self) -> usize;

    /// Begins capturing every byte consumed from this point on. Recordings
    /// do not nest.
    fn start_recording(&mut self);

    /// Ends the capture started by [`WireRead::start_recording`] and returns
    /// the consumed bytes.
    fn stop_recording(&mut self) -> Vec<u8>;

    #[inline]
    fn readn1(&mut self) -> Result<u8, BufferError> {
        Ok(self.readx(1)?[0])
    }

    #[inline]
    fn readn2(&mut self) -> Result<[u8; 2], BufferError> {
        let v = self.readx(2)?;
        Ok([v[0], v[1]])
    }

    #[inline]
    fn readn4(&mut self) -> Result<[u8; 4], BufferError> {
        let v = self.readx(4)?;
        Ok([v[0], v[1], v[2], v[3]])
    }

    #[inline]
    fn readn8(&mut self) -> Result<[u8; 8], BufferError> {
        let v = self.readx(8)?;
        Ok([v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]])
    }
}

/// Reader over a caller-owned byte slice. `readx` views alias the input
/// directly, so byte-string reads through this reader are zero copy.
pub struct SliceReader<'a> {
    data: &'a [u8],
    x: usize,
    rec_start: Option<usize>,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            rec_start: None,
        }
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.x
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        if self.x + n > self.data.len() {
            Err(BufferError::EndOfInput(self.data.len()))
        } else {
            Ok(())
        }
    }
}

impl<'a> WireRead for SliceReader<'a> {
    #[inline]
    fn readx(&mut self, n: usize) -> Result<&[u8], BufferError> {
        self.check(n)?;
        let start = self.x;
        self.x += n;
        Ok(&self.data[start..self.x])
    }

    fn view_attach(&self) -> BytesAttach {
        BytesAttach::View
    }

    fn skip(&mut self, n: usize) -> Result<(), BufferError> {
        self.check(n)?;
        self.x += n;
        Ok(())
    }

    #[inline]
    fn peek(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.data[self.x])
    }

    fn numread(&self) -> usize {
        self.x
    }

    fn start_recording(&mut self) {
        self.rec_start = Some(self.x);
    }

    fn stop_recording(&mut self) -> Vec<u8> {
        let start = self.rec_start.take().unwrap_or(self.x);
        self.data[start..self.x].to_vec()
    }

    #[inline]
    fn readn1(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let v = self.data[self.x];
        self.x += 1;
        Ok(v)
    }
}
