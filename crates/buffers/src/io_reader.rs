//! Buffered wire reader over any `std::io::Read` source.

use std::io::Read;

use crate::read::{BytesAttach, WireRead};
use crate::BufferError;

const DEFAULT_CAPACITY: usize = 4096;

/// Adapts a blocking `io::Read` stream to [`WireRead`].
///
/// Bytes are pulled through an internal refill buffer, so `readx` views
/// alias that buffer ([`BytesAttach::Buffer`]) and die on the next call.
/// A short source surfaces as [`BufferError::EndOfInput`] rather than a
/// zero-length read.
pub struct IoReader<R: Read> {
    src: R,
    buf: Vec<u8>,
    pos: usize,
    end: usize,
    nread: usize,
    rec: Option<Vec<u8>>,
}

impl<R: Read> IoReader<R> {
    pub fn new(src: R) -> Self {
        Self::with_capacity(src, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(src: R, capacity: usize) -> Self {
        Self {
            src,
            buf: vec![0u8; capacity.max(16)],
            pos: 0,
            end: 0,
            nread: 0,
            rec: None,
        }
    }

    /// Unread bytes sitting in the refill buffer.
    fn buffered(&self) -> usize {
        self.end - self.pos
    }

    /// Slides unread bytes to the front and grows the buffer when a single
    /// `readx` needs more than its current length.
    fn compact(&mut self, need: usize) {
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;
        }
        if self.buf.len() < need {
            self.buf.resize(need, 0);
        }
    }

    /// Ensures at least `need` unread bytes are buffered contiguously.
    fn require(&mut self, need: usize) -> Result<(), BufferError> {
        if self.buffered() >= need {
            return Ok(());
        }
        self.compact(need);
        while self.buffered() < need {
            match self.src.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    return Err(BufferError::EndOfInput(self.nread + self.buffered()));
                }
                Ok(n) => self.end += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(BufferError::Io {
                        offset: self.nread + self.buffered(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> WireRead for IoReader<R> {
    fn readx(&mut self, n: usize) -> Result<&[u8], BufferError> {
        self.require(n)?;
        let start = self.pos;
        self.pos += n;
        self.nread += n;
        if let Some(rec) = &mut self.rec {
            rec.extend_from_slice(&self.buf[start..start + n]);
        }
        Ok(&self.buf[start..start + n])
    }

    fn view_attach(&self) -> BytesAttach {
        BytesAttach::Buffer
    }

    fn skip(&mut self, mut n: usize) -> Result<(), BufferError> {
        while n > 0 {
            if self.buffered() == 0 {
                self.require(1)?;
            }
            let take = self.buffered().min(n);
            if let Some(rec) = &mut self.rec {
                rec.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            }
            self.pos += take;
            self.nread += take;
            n -= take;
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<u8, BufferError> {
        self.require(1)?;
        Ok(self.buf[self.pos])
    }

    fn numread(&self) -> usize {
        self.nread
    }

    fn start_recording(&mut self) {
        self.rec = Some(Vec::new());
    }

    fn stop_recording(&mut self) -> Vec<u8> {
        self.rec.take().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_across_refills() {
        let data: Vec<u8> = (0..40u8).collect();
        let mut r = IoReader::with_capacity(&data[..], 16);
        for i in 0..40u8 {
            assert_eq!(r.readn1().unwrap(), i);
        }
        assert!(matches!(r.readn1(), Err(BufferError::EndOfInput(40))));
        assert_eq!(r.numread(), 40);
    }

    #[test]
    fn readx_larger_than_capacity_grows() {
        let data = vec![7u8; 100];
        let mut r = IoReader::with_capacity(&data[..], 16);
        assert_eq!(r.readx(100).unwrap(), &data[..]);
    }

    #[test]
    fn truncated_fixed_read_reports_available() {
        let data = [1u8, 2, 3];
        let mut r = IoReader::new(&data[..]);
        assert!(matches!(r.readn4(), Err(BufferError::EndOfInput(3))));
    }

    #[test]
    fn recording_spans_refills() {
        let data: Vec<u8> = (0..32u8).collect();
        let mut r = IoReader::with_capacity(&data[..], 8);
        r.readn1().unwrap();
        r.start_recording();
        r.readx(10).unwrap();
        r.skip(10).unwrap();
        assert_eq!(r.stop_recording(), (1..21u8).collect::<Vec<_>>());
        assert_eq!(r.readn1().unwrap(), 21);
    }

    #[test]
    fn views_alias_the_internal_buffer() {
        let data = [5u8, 6];
        let r = IoReader::new(&data[..]);
        assert_eq!(r.view_attach(), BytesAttach::Buffer);
    }
}
