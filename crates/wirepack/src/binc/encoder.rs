//! Binc encode driver.

use time::OffsetDateTime;
use wirepack_buffers::Writer;

use super::constants::*;
use crate::codec::Encoder;
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, BincHandle};

pub struct BincEncoder<'h> {
    h: &'h BincHandle,
    pub writer: Writer,
}

impl<'h> BincEncoder<'h> {
    pub(crate) fn new(h: &'h BincHandle) -> Self {
        Self {
            h,
            writer: h.basic.new_writer(),
        }
    }

    fn special(&mut self, vs: u8) {
        self.writer.u8((VD_SPECIAL << 4) | vs);
    }

    /// Writes a non-zero magnitude under `vd`, pruned to its significant
    /// big-endian bytes (`vs = nbytes - 1`).
    fn write_magnitude(&mut self, vd: u8, v: u64) {
        let n = (((64 - v.leading_zeros()) + 7) / 8).max(1) as usize;
        self.writer.u8((vd << 4) | (n as u8 - 1));
        let be = v.to_be_bytes();
        self.writer.bytes(&be[8 - n..]);
    }

    /// Container descriptor with its length: small lengths ride in the
    /// sub-descriptor, larger ones in a u8/u16/u32/u64 argument.
    fn write_len(&mut self, vd: u8, len: usize) {
        let bd = vd << 4;
        if len < 12 {
            self.writer.u8(bd | (len as u8 + 4));
        } else if len <= 0xff {
            self.writer.u16(((bd as u16) << 8) | len as u16);
        } else if len <= 0xffff {
            self.writer.u8u16(bd | 1, len as u16);
        } else if len <= 0xffff_ffff {
            self.writer.u8u32(bd | 2, len as u32);
        } else {
            self.writer.u8u64(bd | 3, len as u64);
        }
    }
}

impl<'h> Encoder for BincEncoder<'h> {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn encode_nil(&mut self) {
        self.special(SP_NIL);
    }

    fn encode_bool(&mut self, v: bool) {
        self.special(if v { SP_TRUE } else { SP_FALSE });
    }

    fn encode_int(&mut self, v: i64) {
        if v >= 0 {
            self.encode_uint(v as u64);
        } else if v == -1 {
            self.special(SP_NEG_ONE);
        } else {
            self.write_magnitude(VD_NEG_INT, v.unsigned_abs());
        }
    }

    fn encode_uint(&mut self, v: u64) {
        if v == 0 {
            self.special(SP_ZERO);
        } else if v <= 16 {
            self.writer.u8((VD_SMALL_INT << 4) | (v as u8 - 1));
        } else {
            self.write_magnitude(VD_POS_INT, v);
        }
    }

    fn encode_f32(&mut self, v: f32) {
        if v == 0.0 {
            self.special(SP_ZERO_FLOAT);
            return;
        }
        self.writer.u8f32((VD_FLOAT << 4) | FL_F32, v);
    }

    fn encode_f64(&mut self, v: f64) {
        if v == 0.0 {
            self.special(SP_ZERO_FLOAT);
            return;
        }
        if v.is_nan() {
            self.special(SP_NAN);
            return;
        }
        if v.is_infinite() {
            self.special(if v > 0.0 { SP_POS_INF } else { SP_NEG_INF });
            return;
        }
        let be = v.to_bits().to_be_bytes();
        let sig = 8 - be.iter().rev().take_while(|&&b| b == 0).count();
        if sig <= 6 {
            self.writer.u8((VD_FLOAT << 4) | FL_PRUNED | FL_F64);
            self.writer.u8(sig as u8);
            self.writer.bytes(&be[..sig]);
        } else {
            self.writer.u8f64((VD_FLOAT << 4) | FL_F64, v);
        }
    }

    fn encode_str(&mut self, s: &str) {
        self.write_len(VD_STR, s.len());
        self.writer.bytes(s.as_bytes());
    }

    fn encode_str_bytes_raw(&mut self, data: &[u8]) {
        self.write_len(VD_STR, data.len());
        self.writer.bytes(data);
    }

    fn encode_bytes(&mut self, data: &[u8]) {
        self.write_len(VD_BYTES, data.len());
        self.writer.bytes(data);
    }

    fn encode_time(&mut self, t: &OffsetDateTime) -> Result<(), CodecError> {
        let sec = t.unix_timestamp();
        let nsec = t.nanosecond();
        if nsec == 0 {
            self.writer.u8((VD_TIME << 4) | 8);
            self.writer.u64(sec as u64);
        } else {
            self.writer.u8((VD_TIME << 4) | 12);
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
        self.write_len(VD_EXT, payload.len());
        self.writer.u8(tag);
        self.writer.bytes(payload);
        Ok(())
    }

    fn encode_raw_ext(&mut self, re: &RawExt) -> Result<(), CodecError> {
        self.encode_ext(re.tag, &re.data)
    }

    fn write_array_start(&mut self, len: usize) {
        self.write_len(VD_ARRAY, len);
    }

    fn write_map_start(&mut self, len: usize) {
        self.write_len(VD_MAP, len);
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

    fn encode(h: &BincHandle, v: &Value) -> Vec<u8> {
        h.encode_value(v).unwrap()
    }

    #[test]
    fn specials_and_small_ints() {
        let h = BincHandle::new();
        assert_eq!(encode(&h, &Value::Nil), hex!("00"));
        assert_eq!(encode(&h, &Value::Bool(false)), hex!("01"));
        assert_eq!(encode(&h, &Value::Bool(true)), hex!("02"));
        assert_eq!(encode(&h, &Value::Uint(0)), hex!("07"));
        assert_eq!(encode(&h, &Value::Int(-1)), hex!("08"));
        assert_eq!(encode(&h, &Value::Uint(1)), hex!("90"));
        assert_eq!(encode(&h, &Value::Uint(16)), hex!("9f"));
        assert_eq!(encode(&h, &Value::Float(0.0)), hex!("06"));
        assert_eq!(encode(&h, &Value::Float(f64::NAN)), hex!("03"));
        assert_eq!(encode(&h, &Value::Float(f64::NEG_INFINITY)), hex!("05"));
    }

    #[test]
    fn pruned_integers() {
        let h = BincHandle::new();
        assert_eq!(encode(&h, &Value::Uint(200)), hex!("10c8"));
        assert_eq!(encode(&h, &Value::Uint(0x12345)), hex!("12012345"));
        assert_eq!(encode(&h, &Value::Int(-200)), hex!("20c8"));
        assert_eq!(
            encode(&h, &Value::Uint(u64::MAX)),
            hex!("17ffffffffffffffff")
        );
    }

    #[test]
    fn pruned_floats() {
        let h = BincHandle::new();
        // 1.5 = 0x3ff8000000000000, two significant bytes
        assert_eq!(encode(&h, &Value::Float(1.5)), hex!("3b023ff8"));
        // 1.1 has a full mantissa
        assert_eq!(
            encode(&h, &Value::Float(1.1)),
            hex!("333ff199999999999a")
        );
    }

    #[test]
    fn length_forms() {
        let h = BincHandle::new();
        assert_eq!(encode(&h, &Value::Str("".into())), hex!("44"));
        assert_eq!(encode(&h, &Value::Str("ab".into())), hex!("466162"));
        let long = "y".repeat(30);
        assert_eq!(encode(&h, &Value::Str(long))[..2], hex!("401e"));
        assert_eq!(
            encode(&h, &Value::Array(vec![Value::Uint(1), Value::Nil])),
            hex!("669000")
        );
        assert_eq!(
            encode(
                &h,
                &Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
            ),
            hex!("75456190")
        );
    }

    #[test]
    fn ext_form() {
        let h = BincHandle::new();
        let mut enc = h.encoder();
        enc.encode_ext(9, &[0xaa, 0xbb]).unwrap();
        assert_eq!(enc.writer.take(), hex!("f609aabb"));
    }
}
