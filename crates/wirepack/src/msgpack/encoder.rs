//! MessagePack encode driver.

use time::OffsetDateTime;
use wirepack_buffers::Writer;

use super::constants::*;
use crate::codec::Encoder;
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, MsgpackHandle};

pub struct MsgpackEncoder<'h> {
    h: &'h MsgpackHandle,
    pub writer: Writer,
}

impl<'h> MsgpackEncoder<'h> {
    pub(crate) fn new(h: &'h MsgpackHandle) -> Self {
        Self {
            h,
            writer: h.basic.new_writer(),
        }
    }

    fn write_str_hdr(&mut self, len: usize) {
        if len <= 0x1f {
            self.writer.u8(MP_FIX_STR | len as u8);
        } else if len <= 0xff && self.h.write_ext {
            // str8 is absent from the legacy encoding
            self.writer.u16(((MP_STR8 as u16) << 8) | len as u16);
        } else if len <= 0xffff {
            self.writer.u8u16(MP_STR16, len as u16);
        } else {
            self.writer.u8u32(MP_STR32, len as u32);
        }
    }

    fn write_bin_hdr(&mut self, len: usize) {
        if len <= 0xff {
            self.writer.u16(((MP_BIN8 as u16) << 8) | len as u16);
        } else if len <= 0xffff {
            self.writer.u8u16(MP_BIN16, len as u16);
        } else {
            self.writer.u8u32(MP_BIN32, len as u32);
        }
    }

    fn write_ext_hdr(&mut self, tag: u8, len: usize) {
        match len {
            1 => self.writer.u8(MP_FIXEXT1),
            2 => self.writer.u8(MP_FIXEXT2),
            4 => self.writer.u8(MP_FIXEXT4),
            8 => self.writer.u8(MP_FIXEXT8),
            16 => self.writer.u8(MP_FIXEXT16),
            _ if len <= 0xff => self.writer.u16(((MP_EXT8 as u16) << 8) | len as u16),
            _ if len <= 0xffff => self.writer.u8u16(MP_EXT16, len as u16),
            _ => self.writer.u8u32(MP_EXT32, len as u32),
        }
        self.writer.u8(tag);
    }

    fn ext_tag_byte(&self, tag: u64) -> Result<u8, CodecError> {
        if !self.h.write_ext {
            return Err(CodecError::Unsupported(
                "extensions need the 2017 encoding (write_ext)",
            ));
        }
        if tag > 0x7f {
            return Err(CodecError::Overflow {
                what: "extension tag",
                offset: 0,
            });
        }
        Ok(tag as u8)
    }
}

impl<'h> Encoder for MsgpackEncoder<'h> {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn encode_nil(&mut self) {
        self.writer.u8(MP_NIL);
    }

    fn encode_bool(&mut self, v: bool) {
        self.writer.u8(if v { MP_TRUE } else { MP_FALSE });
    }

    fn encode_int(&mut self, v: i64) {
        if v >= 0 {
            self.encode_uint(v as u64);
        } else if v >= -32 {
            if self.h.no_fixed_num {
                self.writer.u16(((MP_INT8 as u16) << 8) | (v as u8) as u16);
            } else {
                self.writer.u8(v as u8);
            }
        } else if v >= i8::MIN as i64 {
            self.writer.u16(((MP_INT8 as u16) << 8) | (v as u8) as u16);
        } else if v >= i16::MIN as i64 {
            self.writer.u8u16(MP_INT16, v as u16);
        } else if v >= i32::MIN as i64 {
            self.writer.u8u32(MP_INT32, v as u32);
        } else {
            self.writer.u8u64(MP_INT64, v as u64);
        }
    }

    fn encode_uint(&mut self, v: u64) {
        if v <= MP_POS_FIX_MAX as u64 {
            if self.h.no_fixed_num {
                self.writer.u16(((MP_UINT8 as u16) << 8) | v as u16);
            } else {
                self.writer.u8(v as u8);
            }
        } else if v <= 0xff {
            self.writer.u16(((MP_UINT8 as u16) << 8) | v as u16);
        } else if v <= 0xffff {
            self.writer.u8u16(MP_UINT16, v as u16);
        } else if v <= 0xffff_ffff {
            self.writer.u8u32(MP_UINT32, v as u32);
        } else {
            self.writer.u8u64(MP_UINT64, v);
        }
    }

    fn encode_f32(&mut self, v: f32) {
        self.writer.u8f32(MP_F32, v);
    }

    fn encode_f64(&mut self, v: f64) {
        self.writer.u8f64(MP_F64, v);
    }

    fn encode_str(&mut self, s: &str) {
        self.write_str_hdr(s.len());
        self.writer.bytes(s.as_bytes());
    }

    fn encode_str_bytes_raw(&mut self, data: &[u8]) {
        self.write_str_hdr(data.len());
        self.writer.bytes(data);
    }

    fn encode_bytes(&mut self, data: &[u8]) {
        if self.h.write_ext {
            self.write_bin_hdr(data.len());
        } else {
            self.write_str_hdr(data.len());
        }
        self.writer.bytes(data);
    }

    fn encode_time(&mut self, t: &OffsetDateTime) -> Result<(), CodecError> {
        let sec = t.unix_timestamp();
        let nsec = t.nanosecond() as u64;
        let mut data64 = 0u64;
        let mut len = 4;
        if sec >= 0 && sec >> 34 == 0 {
            data64 = (nsec << 34) | sec as u64;
            if data64 & 0xffff_ffff_0000_0000 != 0 {
                len = 8;
            }
        } else {
            len = 12;
        }
        if self.h.write_ext {
            self.write_ext_hdr(MP_TIME_EXT_TAG, len);
        } else {
            self.write_str_hdr(len);
        }
        match len {
            4 => self.writer.u32(data64 as u32),
            8 => self.writer.u64(data64),
            _ => {
                self.writer.u32(nsec as u32);
                self.writer.u64(sec as u64);
            }
        }
        Ok(())
    }

    fn encode_ext(&mut self, tag: u64, payload: &[u8]) -> Result<(), CodecError> {
        let tag = self.ext_tag_byte(tag)?;
        self.write_ext_hdr(tag, payload.len());
        self.writer.bytes(payload);
        Ok(())
    }

    fn encode_raw_ext(&mut self, re: &RawExt) -> Result<(), CodecError> {
        self.encode_ext(re.tag, &re.data)
    }

    fn write_array_start(&mut self, len: usize) {
        if len <= 0x0f {
            self.writer.u8(MP_FIX_ARRAY | len as u8);
        } else if len <= 0xffff {
            self.writer.u8u16(MP_ARRAY16, len as u16);
        } else {
            self.writer.u8u32(MP_ARRAY32, len as u32);
        }
    }

    fn write_map_start(&mut self, len: usize) {
        if len <= 0x0f {
            self.writer.u8(MP_FIX_MAP | len as u8);
        } else if len <= 0xffff {
            self.writer.u8u16(MP_MAP16, len as u16);
        } else {
            self.writer.u8u32(MP_MAP32, len as u32);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use hex_literal::hex;
    use time::macros::datetime;

    fn encode(h: &MsgpackHandle, v: &Value) -> Vec<u8> {
        h.encode_value(v).unwrap()
    }

    #[test]
    fn integer_ladder() {
        let h = MsgpackHandle::new();
        assert_eq!(encode(&h, &Value::Uint(7)), hex!("07"));
        assert_eq!(encode(&h, &Value::Uint(200)), hex!("ccc8"));
        assert_eq!(encode(&h, &Value::Uint(0x1234)), hex!("cd1234"));
        assert_eq!(encode(&h, &Value::Int(-1)), hex!("ff"));
        assert_eq!(encode(&h, &Value::Int(-33)), hex!("d0df"));
        assert_eq!(encode(&h, &Value::Int(-260)), hex!("d1fefc"));
    }

    #[test]
    fn no_fixed_num_widens_small_ints() {
        let mut h = MsgpackHandle::new();
        h.no_fixed_num = true;
        assert_eq!(encode(&h, &Value::Uint(7)), hex!("cc07"));
        assert_eq!(encode(&h, &Value::Int(-2)), hex!("d0fe"));
    }

    #[test]
    fn str_headers_respect_write_ext() {
        let mut h = MsgpackHandle::new();
        let long = "x".repeat(40);
        assert_eq!(encode(&h, &Value::Str("a".into())), hex!("a161"));
        // legacy has no str8, jumps to str16
        assert_eq!(encode(&h, &Value::Str(long.clone()))[..3], hex!("da0028"));
        h.write_ext = true;
        assert_eq!(encode(&h, &Value::Str(long))[..2], hex!("d928"));
    }

    #[test]
    fn bytes_family_depends_on_mode() {
        let mut h = MsgpackHandle::new();
        assert_eq!(encode(&h, &Value::Bytes(vec![1, 2])), hex!("a20102"));
        h.write_ext = true;
        assert_eq!(encode(&h, &Value::Bytes(vec![1, 2])), hex!("c4020102"));
    }

    #[test]
    fn timestamp_forms() {
        let mut h = MsgpackHandle::new();
        h.write_ext = true;
        let t = datetime!(2000-01-01 00:00:00 UTC);
        assert_eq!(encode(&h, &Value::Time(t)), hex!("d6ff386d4380"));
        let with_nanos = datetime!(2000-01-01 00:00:00.000000001 UTC);
        let out = encode(&h, &Value::Time(with_nanos));
        assert_eq!(out[0], 0xd7);
        assert_eq!(out[1], 0xff);
        let before_epoch = datetime!(1969-12-31 23:59:59 UTC);
        assert_eq!(encode(&h, &Value::Time(before_epoch))[..3], hex!("c70cff"));
    }

    #[test]
    fn containers() {
        let h = MsgpackHandle::new();
        assert_eq!(
            encode(&h, &Value::Array(vec![Value::Uint(1), Value::Uint(2)])),
            hex!("920102")
        );
        assert_eq!(
            encode(
                &h,
                &Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
            ),
            hex!("81a16101")
        );
    }

    #[test]
    fn ext_needs_write_ext() {
        let h = MsgpackHandle::new();
        let mut enc = h.encoder();
        assert!(matches!(
            enc.encode_ext(5, &[1]),
            Err(CodecError::Unsupported(_))
        ));
    }
}
