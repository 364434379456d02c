//! JSON encode driver.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use data_encoding::{BASE32, BASE32HEX};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use wirepack_buffers::Writer;

use crate::codec::{write_value, Encoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, IntegerAsString, JsonBytesFormat, JsonHandle, JsonTimeFormat};

const SPACES: [u8; 128] = [b' '; 128];
const TABS: [u8; 32] = [b'\t'; 32];

/// Largest integer magnitude a double-backed JSON reader keeps exact.
const SAFE_INT_MAX: u64 = 1 << 53;

pub struct JsonEncoder<'h> {
    h: &'h JsonHandle,
    pub writer: Writer,
    depth: u16,
    in_key: bool,
}

impl<'h> JsonEncoder<'h> {
    pub(crate) fn new(h: &'h JsonHandle) -> Self {
        Self {
            h,
            writer: h.basic.new_writer(),
            depth: 0,
            in_key: false,
        }
    }

    fn write_indent(&mut self) {
        if self.h.indent == 0 {
            return;
        }
        self.writer.u8(b'\n');
        let (cache, per): (&[u8], usize) = if self.h.indent > 0 {
            (&SPACES, self.h.indent as usize)
        } else {
            (&TABS, (-(self.h.indent as i16)) as usize)
        };
        let mut n = per * self.depth as usize;
        while n > 0 {
            let take = n.min(cache.len());
            self.writer.bytes(&cache[..take]);
            n -= take;
        }
    }

    fn int_quoted(&self, beyond_safe: bool) -> bool {
        if self.in_key && self.h.map_key_as_string {
            return true;
        }
        match self.h.integer_as_string {
            IntegerAsString::Always => true,
            IntegerAsString::BeyondSafeRange => beyond_safe,
            IntegerAsString::Never => false,
        }
    }

    fn write_uint_body(&mut self, v: u64) {
        let mut scratch = [0u8; 24];
        let mut i = scratch.len();
        let mut v = v;
        loop {
            i -= 1;
            scratch[i] = b'0' + (v % 10) as u8;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        self.writer.bytes(&scratch[i..]);
    }

    fn write_json_string(&mut self, s: &str) {
        self.writer.u8(b'"');
        let raw = s.as_bytes();
        let mut start = 0;
        for (i, c) in s.char_indices() {
            let escaped = match c {
                '"' | '\\' | '\u{2028}' | '\u{2029}' => true,
                '\u{0}'..='\u{1f}' => true,
                '<' | '>' | '&' => !self.h.html_chars_as_is,
                _ => false,
            };
            if !escaped {
                continue;
            }
            self.writer.bytes(&raw[start..i]);
            match c {
                '"' => self.writer.ascii("\\\""),
                '\\' => self.writer.ascii("\\\\"),
                '\n' => self.writer.ascii("\\n"),
                '\r' => self.writer.ascii("\\r"),
                '\t' => self.writer.ascii("\\t"),
                '\u{8}' => self.writer.ascii("\\b"),
                '\u{c}' => self.writer.ascii("\\f"),
                _ => {
                    const HEX: &[u8; 16] = b"0123456789abcdef";
                    let u = c as u32;
                    self.writer.bytes(&[
                        b'\\',
                        b'u',
                        HEX[((u >> 12) & 0xf) as usize],
                        HEX[((u >> 8) & 0xf) as usize],
                        HEX[((u >> 4) & 0xf) as usize],
                        HEX[(u & 0xf) as usize],
                    ]);
                }
            }
            start = i + c.len_utf8();
        }
        self.writer.bytes(&raw[start..]);
        self.writer.u8(b'"');
    }
}

impl<'h> Encoder for JsonEncoder<'h> {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn encode_nil(&mut self) {
        self.writer.u32(u32::from_be_bytes(*b"null"));
    }

    fn encode_bool(&mut self, v: bool) {
        let quoted = self.in_key && self.h.map_key_as_string;
        if quoted {
            self.writer.ascii(if v { "\"true\"" } else { "\"false\"" });
        } else if v {
            self.writer.u32(u32::from_be_bytes(*b"true"));
        } else {
            self.writer.ascii("false");
        }
    }

    fn encode_int(&mut self, v: i64) {
        let quoted = self.int_quoted(v.unsigned_abs() > SAFE_INT_MAX);
        if quoted {
            self.writer.u8(b'"');
        }
        if v < 0 {
            self.writer.u8(b'-');
        }
        self.write_uint_body(v.unsigned_abs());
        if quoted {
            self.writer.u8(b'"');
        }
    }

    fn encode_uint(&mut self, v: u64) {
        let quoted = self.int_quoted(v > SAFE_INT_MAX);
        if quoted {
            self.writer.u8(b'"');
        }
        self.write_uint_body(v);
        if quoted {
            self.writer.u8(b'"');
        }
    }

    fn encode_f32(&mut self, v: f32) {
        self.encode_f64(v as f64);
    }

    fn encode_f64(&mut self, v: f64) {
        if !v.is_finite() {
            self.encode_nil();
            return;
        }
        let quoted = self.in_key && self.h.map_key_as_string;
        if quoted {
            self.writer.u8(b'"');
        }
        let a = v.abs();
        if v != 0.0 && (a < 1e-6 || a >= 1e21) {
            let s = format!("{:e}", v);
            self.writer.ascii(&s);
        } else {
            let s = format!("{}", v);
            self.writer.ascii(&s);
            if !s.bytes().any(|b| b == b'.' || b == b'e' || b == b'E') {
                self.writer.ascii(".0");
            }
        }
        if quoted {
            self.writer.u8(b'"');
        }
    }

    fn encode_str(&mut self, s: &str) {
        self.write_json_string(s);
    }

    fn encode_str_bytes_raw(&mut self, data: &[u8]) {
        // invalid sequences degrade to U+FFFD
        let s = String::from_utf8_lossy(data);
        self.write_json_string(&s);
    }

    fn encode_bytes(&mut self, data: &[u8]) {
        let s = match self.h.bytes_format {
            JsonBytesFormat::Base64 => STANDARD.encode(data),
            JsonBytesFormat::Base64Url => URL_SAFE.encode(data),
            JsonBytesFormat::Base32 => BASE32.encode(data),
            JsonBytesFormat::Base32Hex => BASE32HEX.encode(data),
            JsonBytesFormat::Base16 => hex::encode(data),
        };
        // all of these alphabets are escape-free
        self.writer.u8(b'"');
        self.writer.ascii(&s);
        self.writer.u8(b'"');
    }

    fn encode_time(&mut self, t: &OffsetDateTime) -> Result<(), CodecError> {
        match self.h.time_format {
            JsonTimeFormat::Rfc3339 => {
                let s = t
                    .format(&Rfc3339)
                    .map_err(|e| CodecError::Time(e.to_string()))?;
                self.writer.u8(b'"');
                self.writer.ascii(&s);
                self.writer.u8(b'"');
            }
            JsonTimeFormat::UnixSeconds => self.encode_int(t.unix_timestamp()),
            JsonTimeFormat::UnixMillis => {
                self.encode_int((t.unix_timestamp_nanos() / 1_000_000) as i64)
            }
            JsonTimeFormat::UnixMicros => {
                self.encode_int((t.unix_timestamp_nanos() / 1_000) as i64)
            }
            JsonTimeFormat::UnixNanos => {
                let n = i64::try_from(t.unix_timestamp_nanos())
                    .map_err(|_| CodecError::Time("nanosecond timestamp overflow".into()))?;
                self.encode_int(n);
            }
        }
        Ok(())
    }

    fn encode_ext(&mut self, _tag: u64, payload: &[u8]) -> Result<(), CodecError> {
        // JSON has no tagged wire form; the payload stands alone
        self.encode_bytes(payload);
        Ok(())
    }

    fn encode_raw_ext(&mut self, re: &RawExt) -> Result<(), CodecError> {
        if let Some(v) = re.value.as_deref() {
            write_value(self, v)
        } else {
            self.encode_bytes(&re.data);
            Ok(())
        }
    }

    fn write_array_start(&mut self, _len: usize) {
        self.writer.u8(b'[');
        self.depth += 1;
    }

    fn write_array_elem(&mut self, first: bool) {
        if !first {
            self.writer.u8(b',');
        }
        self.write_indent();
    }

    fn write_array_end(&mut self) {
        self.depth -= 1;
        self.write_indent();
        self.writer.u8(b']');
    }

    fn write_array_empty(&mut self) {
        self.writer.ascii("[]");
    }

    fn write_map_start(&mut self, _len: usize) {
        self.writer.u8(b'{');
        self.depth += 1;
    }

    fn write_map_elem_key(&mut self, first: bool) {
        if !first {
            self.writer.u8(b',');
        }
        self.write_indent();
    }

    fn write_map_elem_value(&mut self) {
        if self.h.indent != 0 {
            self.writer.ascii(": ");
        } else {
            self.writer.u8(b':');
        }
    }

    fn write_map_end(&mut self) {
        self.depth -= 1;
        self.write_indent();
        self.writer.u8(b'}');
    }

    fn write_map_empty(&mut self) {
        self.writer.ascii("{}");
    }

    fn map_key_hint(&mut self, on: bool) {
        self.in_key = on;
    }

    fn end(&mut self) {
        if self.h.term_whitespace {
            self.writer.u8(b' ');
        }
    }

    fn fork(&self) -> Self {
        Self {
            h: self.h,
            writer: self.h.basic.pool_get(),
            depth: 0,
            in_key: false,
        }
    }

    fn join(self) -> Vec<u8> {
        let Self { h, mut writer, .. } = self;
        let out = writer.take();
        h.basic.pool_put(writer);
        out
    }
}
