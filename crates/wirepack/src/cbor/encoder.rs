//! CBOR encode driver.

use time::OffsetDateTime;
use wirepack_buffers::Writer;

use super::constants::*;
use crate::codec::{write_value, Encoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, CborHandle};
use crate::num;

pub struct CborEncoder<'h> {
    h: &'h CborHandle,
    pub writer: Writer,
}

impl<'h> CborEncoder<'h> {
    pub(crate) fn new(h: &'h CborHandle) -> Self {
        Self {
            h,
            writer: h.basic.new_writer(),
        }
    }

    /// Writes a major type with its argument in shortest form.
    fn write_type_len(&mut self, major: u8, v: u64) {
        let bd = major << 5;
        if v <= 23 {
            self.writer.u8(bd | v as u8);
        } else if v <= 0xff {
            self.writer.u16((((bd | 0x18) as u16) << 8) | v as u16);
        } else if v <= 0xffff {
            self.writer.u8u16(bd | 0x19, v as u16);
        } else if v <= 0xffff_ffff {
            self.writer.u8u32(bd | 0x1a, v as u32);
        } else {
            self.writer.u8u64(bd | 0x1b, v);
        }
    }

    fn write_tag(&mut self, tag: u64) {
        self.write_type_len(MAJOR_TAG, tag);
    }

    fn write_f16(&mut self, bits: u16) {
        self.writer.u8(BD_F16);
        self.writer.u16(bits);
    }

    /// Chunk size for indefinite-length strings.
    fn chunk_size(len: usize) -> usize {
        (len / 4).clamp(4, 1024)
    }

    fn write_chunked_bytes(&mut self, major: u8, data: &[u8]) {
        self.writer.u8((major << 5) | INFO_INDEFINITE);
        let n = Self::chunk_size(data.len());
        for chunk in data.chunks(n) {
            self.write_type_len(major, chunk.len() as u64);
            self.writer.bytes(chunk);
        }
        self.writer.u8(BD_BREAK);
    }

    fn write_chunked_str(&mut self, s: &str) {
        self.writer.u8(BD_INDEF_STR);
        let n = Self::chunk_size(s.len());
        let mut rest = s;
        while !rest.is_empty() {
            let mut end = n.min(rest.len());
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            let (chunk, tail) = rest.split_at(end);
            self.write_type_len(MAJOR_STR, chunk.len() as u64);
            self.writer.bytes(chunk.as_bytes());
            rest = tail;
        }
        self.writer.u8(BD_BREAK);
    }
}

impl<'h> Encoder for CborEncoder<'h> {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn encode_nil(&mut self) {
        self.writer.u8(BD_NIL);
    }

    fn encode_bool(&mut self, v: bool) {
        self.writer.u8(if v { BD_TRUE } else { BD_FALSE });
    }

    fn encode_int(&mut self, v: i64) {
        if v >= 0 {
            self.write_type_len(MAJOR_UINT, v as u64);
        } else {
            self.write_type_len(MAJOR_NEGATIVE, (-1i64).wrapping_sub(v) as u64);
        }
    }

    fn encode_uint(&mut self, v: u64) {
        self.write_type_len(MAJOR_UINT, v);
    }

    fn encode_f32(&mut self, v: f32) {
        if self.h.optimum_size {
            if v.is_nan() {
                self.write_f16(0x7e00);
                return;
            }
            if let Some(h) = num::f32_to_f16_exact(v) {
                self.write_f16(h.to_bits());
                return;
            }
        }
        self.writer.u8f32(BD_F32, v);
    }

    fn encode_f64(&mut self, v: f64) {
        if self.h.optimum_size {
            if let Some(f) = num::f64_to_f32_exact(v) {
                self.encode_f32(f);
                return;
            }
            if v.is_nan() {
                self.write_f16(0x7e00);
                return;
            }
        }
        self.writer.u8f64(BD_F64, v);
    }

    fn encode_str(&mut self, s: &str) {
        if self.h.indefinite_length && !s.is_empty() {
            self.write_chunked_str(s);
            return;
        }
        self.write_type_len(MAJOR_STR, s.len() as u64);
        self.writer.bytes(s.as_bytes());
    }

    fn encode_str_bytes_raw(&mut self, data: &[u8]) {
        self.write_type_len(MAJOR_STR, data.len() as u64);
        self.writer.bytes(data);
    }

    fn encode_bytes(&mut self, data: &[u8]) {
        if self.h.indefinite_length && !data.is_empty() {
            self.write_chunked_bytes(MAJOR_BYTES, data);
            return;
        }
        self.write_type_len(MAJOR_BYTES, data.len() as u64);
        self.writer.bytes(data);
    }

    fn encode_time(&mut self, t: &OffsetDateTime) -> Result<(), CodecError> {
        if self.h.time_rfc3339 {
            let s = t
                .format(&time::format_description::well_known::Rfc3339)
                .map_err(|e| CodecError::Time(e.to_string()))?;
            self.write_tag(TAG_TIME_STRING);
            self.write_type_len(MAJOR_STR, s.len() as u64);
            self.writer.bytes(s.as_bytes());
            return Ok(());
        }
        // epoch form, rounded to microsecond
        let n = t.unix_timestamp_nanos();
        let micros = if n >= 0 { (n + 500) / 1000 } else { (n - 499) / 1000 };
        self.write_tag(TAG_TIME_EPOCH);
        if micros % 1_000_000 == 0 {
            self.encode_int((micros / 1_000_000) as i64);
        } else {
            self.encode_f64(micros as f64 / 1e6);
        }
        Ok(())
    }

    fn encode_ext(&mut self, tag: u64, payload: &[u8]) -> Result<(), CodecError> {
        self.write_tag(tag);
        self.write_type_len(MAJOR_BYTES, payload.len() as u64);
        self.writer.bytes(payload);
        Ok(())
    }

    fn encode_raw_ext(&mut self, re: &RawExt) -> Result<(), CodecError> {
        self.write_tag(re.tag);
        if let Some(v) = re.value.as_deref() {
            write_value(self, v)
        } else if re.data.is_empty() {
            self.encode_nil();
            Ok(())
        } else {
            // data holds a complete encoded value, spliced back verbatim
            self.writer.bytes(&re.data);
            Ok(())
        }
    }

    fn write_array_start(&mut self, len: usize) {
        if self.h.indefinite_length {
            self.writer.u8(BD_INDEF_ARRAY);
        } else {
            self.write_type_len(MAJOR_ARRAY, len as u64);
        }
    }

    fn write_array_end(&mut self) {
        if self.h.indefinite_length {
            self.writer.u8(BD_BREAK);
        }
    }

    fn write_map_start(&mut self, len: usize) {
        if self.h.indefinite_length {
            self.writer.u8(BD_INDEF_MAP);
        } else {
            self.write_type_len(MAJOR_MAP, len as u64);
        }
    }

    fn write_map_end(&mut self) {
        if self.h.indefinite_length {
            self.writer.u8(BD_BREAK);
        }
    }

    fn fork(&self) -> Self {
        Self {
            h: self.h,
            writer: self.h.basic.pool_get(),
        }
    }

    fn join(self) -> Vec<u8> {
        let Self { h, mut writer } = self;
        let out = writer.take();
        h.basic.pool_put(writer);
        out
    }
}
