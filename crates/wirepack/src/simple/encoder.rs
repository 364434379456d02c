//! Simple format encode driver.

use time::OffsetDateTime;
use wirepack_buffers::Writer;

use super::constants::*;
use crate::codec::Encoder;
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, SimpleHandle};

pub struct SimpleEncoder<'h> {
    h: &'h SimpleHandle,
    pub writer: Writer,
}

impl<'h> SimpleEncoder<'h> {
    pub(crate) fn new(h: &'h SimpleHandle) -> Self {
        Self {
            h,
            writer: h.basic.new_writer(),
        }
    }

    /// Writes an integer magnitude under `bd` in the smallest of the four
    /// fixed widths.
    fn write_magnitude(&mut self, bd: u8, v: u64) {
        if v <= 0xff {
            self.writer.u16(((bd as u16) << 8) | v as u16);
        } else if v <= 0xffff {
            self.writer.u8u16(bd + 1, v as u16);
        } else if v <= 0xffff_ffff {
            self.writer.u8u32(bd + 2, v as u32);
        } else {
            self.writer.u8u64(bd + 3, v);
        }
    }

    /// Writes a container descriptor with its length form.
    fn write_len(&mut self, bd: u8, len: usize) {
        if len == 0 {
            self.writer.u8(bd);
        } else if len <= 0xff {
            self.writer.u16((((bd + 1) as u16) << 8) | len as u16);
        } else if len <= 0xffff {
            self.writer.u8u16(bd + 2, len as u16);
        } else if len <= 0xffff_ffff {
            self.writer.u8u32(bd + 3, len as u32);
        } else {
            self.writer.u8u64(bd + 4, len as u64);
        }
    }
}

impl<'h> Encoder for SimpleEncoder<'h> {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn encode_nil(&mut self) {
        self.writer.u8(SD_NIL);
    }

    fn encode_bool(&mut self, v: bool) {
        if v {
            self.writer.u8(SD_TRUE);
        } else if self.h.enc_zero_values_as_nil {
            self.encode_nil();
        } else {
            self.writer.u8(SD_FALSE);
        }
    }

    fn encode_int(&mut self, v: i64) {
        if v >= 0 {
            self.encode_uint(v as u64);
        } else {
            self.write_magnitude(SD_NEG_INT, v.unsigned_abs());
        }
    }

    fn encode_uint(&mut self, v: u64) {
        if v == 0 && self.h.enc_zero_values_as_nil {
            self.encode_nil();
            return;
        }
        self.write_magnitude(SD_POS_INT, v);
    }

    fn encode_f32(&mut self, v: f32) {
        if v == 0.0 && self.h.enc_zero_values_as_nil {
            self.encode_nil();
            return;
        }
        self.writer.u8f32(SD_F32, v);
    }

    fn encode_f64(&mut self, v: f64) {
        if v == 0.0 && self.h.enc_zero_values_as_nil {
            self.encode_nil();
            return;
        }
        self.writer.u8f64(SD_F64, v);
    }

    fn encode_str(&mut self, s: &str) {
        self.write_len(SD_STR, s.len());
        self.writer.bytes(s.as_bytes());
    }

    fn encode_str_bytes_raw(&mut self, data: &[u8]) {
        self.write_len(SD_STR, data.len());
        self.writer.bytes(data);
    }

    fn encode_bytes(&mut self, data: &[u8]) {
        self.write_len(SD_BYTES, data.len());
        self.writer.bytes(data);
    }

    fn encode_time(&mut self, t: &OffsetDateTime) -> Result<(), CodecError> {
        let sec = t.unix_timestamp();
        let nsec = t.nanosecond();
        self.writer.u8(SD_TIME);
        if nsec == 0 {
            self.writer.u8(8);
            self.writer.u64(sec as u64);
        } else {
            self.writer.u8(12);
            self.writer.u64(sec as u64);
            self.writer.u32(nsec);
        }
        Ok(())
    }

    fn encode_ext(&mut self, tag: u64, payload: &[u8]) -> Result<(), CodecError> {
        let tag = u8::try_from(tag).map_err(|_| CodecError::Overflow {
            what: "extension tag",
            offset: 0,
        })?;
        self.write_len(SD_EXT, payload.len());
        self.writer.u8(tag);
        self.writer.bytes(payload);
        Ok(())
    }

    fn encode_raw_ext(&mut self, re: &RawExt) -> Result<(), CodecError> {
        self.encode_ext(re.tag, &re.data)
    }

    fn write_array_start(&mut self, len: usize) {
        self.write_len(SD_ARRAY, len);
    }

    fn write_map_start(&mut self, len: usize) {
        self.write_len(SD_MAP, len);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use hex_literal::hex;

    fn encode(h: &SimpleHandle, v: &Value) -> Vec<u8> {
        h.encode_value(v).unwrap()
    }

    #[test]
    fn scalar_forms() {
        let h = SimpleHandle::new();
        assert_eq!(encode(&h, &Value::Nil), hex!("01"));
        assert_eq!(encode(&h, &Value::Bool(false)), hex!("02"));
        assert_eq!(encode(&h, &Value::Uint(7)), hex!("0807"));
        assert_eq!(encode(&h, &Value::Uint(0x1234)), hex!("091234"));
        assert_eq!(encode(&h, &Value::Int(-7)), hex!("0c07"));
        assert_eq!(encode(&h, &Value::Int(i64::MIN))[..1], hex!("0f"));
        assert_eq!(encode(&h, &Value::Float(1.5)), hex!("053ff8000000000000"));
    }

    #[test]
    fn zero_values_as_nil() {
        let mut h = SimpleHandle::new();
        h.enc_zero_values_as_nil = true;
        assert_eq!(encode(&h, &Value::Uint(0)), hex!("01"));
        assert_eq!(encode(&h, &Value::Bool(false)), hex!("01"));
        assert_eq!(encode(&h, &Value::Float(0.0)), hex!("01"));
        assert_eq!(encode(&h, &Value::Uint(1)), hex!("0801"));
    }

    #[test]
    fn length_forms() {
        let h = SimpleHandle::new();
        assert_eq!(encode(&h, &Value::Str("".into())), hex!("d8"));
        assert_eq!(encode(&h, &Value::Str("ab".into())), hex!("d9026162"));
        assert_eq!(encode(&h, &Value::Bytes(vec![9])), hex!("e10109"));
        assert_eq!(
            encode(&h, &Value::Array(vec![Value::Uint(1)])),
            hex!("e9010801")
        );
        assert_eq!(
            encode(
                &h,
                &Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
            ),
            hex!("f101d901610801")
        );
        let long = "x".repeat(300);
        let out = encode(&h, &Value::Str(long));
        assert_eq!(out[..3], hex!("da012c"));
    }
}
