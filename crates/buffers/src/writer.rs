//! Auto-growing binary writer used by all format encoders.

/// Byte buffer writer with an explicit flush cursor.
///
/// `x` is the write position and `x0` the position of the last flush, so a
/// caller can interleave writes and incremental flushes (for example when
/// draining to an `io::Write` sink between values).
///
/// # Example
///
/// ```
/// use wirepack_buffers::Writer;
///
/// let mut w = Writer::new();
/// w.u8(0x01);
/// w.u16(0x0203);
/// assert_eq!(w.flush(), [0x01, 0x02, 0x03]);
/// ```
pub struct Writer {
    buf: Vec<u8>,
    x0: usize,
    x: usize,
    alloc_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a writer with the default 64 KiB allocation unit.
    pub fn new() -> Self {
        Self::with_alloc_size(64 * 1024)
    }

    pub fn with_alloc_size(alloc_size: usize) -> Self {
        Self {
            buf: vec![0u8; alloc_size],
            x0: 0,
            x: 0,
            alloc_size,
        }
    }

    /// Number of bytes written since the last flush.
    pub fn len(&self) -> usize {
        self.x - self.x0
    }

    pub fn is_empty(&self) -> bool {
        self.x == self.x0
    }

    /// Unflushed bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.buf[self.x0..self.x]
    }

    /// Makes room for at least `capacity` more bytes.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let remaining = self.buf.len() - self.x;
        if remaining < capacity {
            let used = self.x - self.x0;
            let needed = used + capacity;
            let new_size = if needed <= self.alloc_size {
                self.alloc_size
            } else {
                needed * 2
            };
            self.grow(new_size);
        }
    }

    fn grow(&mut self, new_size: usize) {
        let mut next = vec![0u8; new_size];
        next[..self.x - self.x0].copy_from_slice(&self.buf[self.x0..self.x]);
        self.buf = next;
        self.x -= self.x0;
        self.x0 = 0;
    }

    /// Drops everything written since the last flush.
    pub fn reset(&mut self) {
        self.x = self.x0;
    }

    /// Returns the bytes written since the last flush and advances the
    /// flush cursor past them.
    pub fn flush(&mut self) -> Vec<u8> {
        let out = self.buf[self.x0..self.x].to_vec();
        self.x0 = self.x;
        out
    }

    /// Drains the unflushed bytes into `sink`.
    pub fn flush_to<W: std::io::Write>(&mut self, sink: &mut W) -> std::io::Result<()> {
        sink.write_all(&self.buf[self.x0..self.x])?;
        self.x0 = self.x;
        Ok(())
    }

    /// Takes the written bytes and rewinds both cursors to the start, so
    /// the writer can be reused from scratch.
    pub fn take(&mut self) -> Vec<u8> {
        let out = self.buf[self.x0..self.x].to_vec();
        self.x0 = 0;
        self.x = 0;
        out
    }

    #[inline]
    pub fn u8(&mut self, v: u8) {
        self.ensure_capacity(1);
        self.buf[self.x] = v;
        self.x += 1;
    }

    #[inline]
    pub fn i8(&mut self, v: i8) {
        self.u8(v as u8);
    }

    #[inline]
    pub fn u16(&mut self, v: u16) {
        self.ensure_capacity(2);
        self.buf[self.x..self.x + 2].copy_from_slice(&v.to_be_bytes());
        self.x += 2;
    }

    #[inline]
    pub fn u32(&mut self, v: u32) {
        self.ensure_capacity(4);
        self.buf[self.x..self.x + 4].copy_from_slice(&v.to_be_bytes());
        self.x += 4;
    }

    #[inline]
    pub fn u64(&mut self, v: u64) {
        self.ensure_capacity(8);
        self.buf[self.x..self.x + 8].copy_from_slice(&v.to_be_bytes());
        self.x += 8;
    }

    #[inline]
    pub fn i64(&mut self, v: i64) {
        self.u64(v as u64);
    }

    #[inline]
    pub fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    #[inline]
    pub fn f64(&mut self, v: f64) {
        self.u64(v.to_bits());
    }

    /// Writes a descriptor byte followed by a big-endian u16.
    #[inline]
    pub fn u8u16(&mut self, bd: u8, v: u16) {
        self.ensure_capacity(3);
        self.buf[self.x] = bd;
        self.buf[self.x + 1..self.x + 3].copy_from_slice(&v.to_be_bytes());
        self.x += 3;
    }

    /// Writes a descriptor byte followed by a big-endian u32.
    #[inline]
    pub fn u8u32(&mut self, bd: u8, v: u32) {
        self.ensure_capacity(5);
        self.buf[self.x] = bd;
        self.buf[self.x + 1..self.x + 5].copy_from_slice(&v.to_be_bytes());
        self.x += 5;
    }

    /// Writes a descriptor byte followed by a big-endian u64.
    #[inline]
    pub fn u8u64(&mut self, bd: u8, v: u64) {
        self.ensure_capacity(9);
        self.buf[self.x] = bd;
        self.buf[self.x + 1..self.x + 9].copy_from_slice(&v.to_be_bytes());
        self.x += 9;
    }

    /// Writes a descriptor byte followed by a big-endian f32.
    #[inline]
    pub fn u8f32(&mut self, bd: u8, v: f32) {
        self.u8u32(bd, v.to_bits());
    }

    /// Writes a descriptor byte followed by a big-endian f64.
    #[inline]
    pub fn u8f64(&mut self, bd: u8, v: f64) {
        self.u8u64(bd, v.to_bits());
    }

    /// Writes a raw byte slice.
    pub fn bytes(&mut self, data: &[u8]) {
        self.ensure_capacity(data.len());
        self.buf[self.x..self.x + data.len()].copy_from_slice(data);
        self.x += data.len();
    }

    /// Writes the UTF-8 bytes of `s` and returns how many were written.
    pub fn utf8(&mut self, s: &str) -> usize {
        self.bytes(s.as_bytes());
        s.len()
    }

    /// Writes an ASCII string. ASCII is a UTF-8 subset, so this is a plain
    /// byte copy kept as a separate name for call-site clarity.
    pub fn ascii(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_writes() {
        let mut w = Writer::new();
        w.u8(0x01);
        w.u16(0x0203);
        w.u32(0x04050607);
        assert_eq!(w.flush(), [1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn fused_descriptor_writes() {
        let mut w = Writer::new();
        w.u8u16(0xcd, 0x01ff);
        assert_eq!(w.flush(), [0xcd, 0x01, 0xff]);
        w.u8u64(0xcf, 1);
        assert_eq!(w.flush(), [0xcf, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn float_writes_are_ieee_bits() {
        let mut w = Writer::new();
        w.f64(1.1);
        assert_eq!(w.flush(), 1.1f64.to_be_bytes());
        w.f32(1.5);
        assert_eq!(w.flush(), 1.5f32.to_be_bytes());
    }

    #[test]
    fn growth_preserves_unflushed_bytes() {
        let mut w = Writer::with_alloc_size(8);
        w.bytes(&[1, 2, 3, 4, 5, 6]);
        w.bytes(&[7, 8, 9, 10]);
        assert_eq!(w.flush(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn incremental_flush() {
        let mut w = Writer::new();
        w.u8(0x0a);
        assert_eq!(w.flush(), [0x0a]);
        w.u8(0x0b);
        assert_eq!(w.flush(), [0x0b]);
    }

    #[test]
    fn take_rewinds_for_reuse() {
        let mut w = Writer::new();
        w.utf8("abc");
        assert_eq!(w.take(), b"abc");
        assert!(w.is_empty());
        w.u8(1);
        assert_eq!(w.take(), [1]);
    }

    #[test]
    fn flush_to_sink() {
        let mut w = Writer::new();
        w.bytes(&[1, 2, 3]);
        let mut sink = Vec::new();
        w.flush_to(&mut sink).unwrap();
        assert_eq!(sink, [1, 2, 3]);
        assert!(w.is_empty());
    }

    #[test]
    fn reset_drops_pending_bytes() {
        let mut w = Writer::new();
        w.u8(1);
        w.flush();
        w.u8(2);
        w.reset();
        assert_eq!(w.flush(), []);
    }
}
