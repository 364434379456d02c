//! CBOR decode driver.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use wirepack_buffers::{SliceReader, WireRead};

use super::constants::*;
use crate::codec::{read_value, Decoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, CborHandle};
use crate::num;
use crate::value::{ContainerKind, Len, Naked, Value};

pub struct CborDecoder<'h, R> {
    h: &'h CborHandle,
    rd: R,
    bd: u8,
    bd_read: bool,
    depth: u16,
}

impl<'h, R: WireRead> CborDecoder<'h, R> {
    pub(crate) fn new(h: &'h CborHandle, rd: R) -> Self {
        Self {
            h,
            rd,
            bd: 0,
            bd_read: false,
            depth: 0,
        }
    }

    fn read_bd(&mut self) -> Result<u8, CodecError> {
        if !self.bd_read {
            self.bd = self.rd.readn1()?;
            self.bd_read = true;
        }
        Ok(self.bd)
    }

    fn malformed(&self, bd: u8) -> CodecError {
        CodecError::Malformed {
            bd,
            offset: self.rd.numread(),
        }
    }

    /// Reads the argument encoded in the descriptor's additional info.
    fn uint_arg(&mut self, bd: u8) -> Result<u64, CodecError> {
        match bd & 0x1f {
            info @ 0..=23 => Ok(info as u64),
            24 => Ok(self.rd.readn1()? as u64),
            25 => Ok(u16::from_be_bytes(self.rd.readn2()?) as u64),
            26 => Ok(u32::from_be_bytes(self.rd.readn4()?) as u64),
            27 => Ok(u64::from_be_bytes(self.rd.readn8()?)),
            _ => Err(self.malformed(bd)),
        }
    }

    /// Consumes leading tags for typed scalar reads and returns the first
    /// non-tag descriptor.
    fn read_bd_skip_tags(&mut self) -> Result<u8, CodecError> {
        loop {
            let bd = self.read_bd()?;
            if bd >> 5 != MAJOR_TAG {
                return Ok(bd);
            }
            self.bd_read = false;
            self.uint_arg(bd)?;
        }
    }

    fn read_float_with_bd(&mut self, bd: u8) -> Result<f64, CodecError> {
        match bd {
            BD_F16 => Ok(f64::from(half::f16::from_bits(u16::from_be_bytes(
                self.rd.readn2()?,
            )))),
            BD_F32 => Ok(f32::from_be_bytes(self.rd.readn4()?) as f64),
            BD_F64 => Ok(f64::from_be_bytes(self.rd.readn8()?)),
            _ => Err(self.malformed(bd)),
        }
    }

    /// Reads the body of a byte or text string whose descriptor is `bd`,
    /// concatenating indefinite-length chunks.
    fn read_string_body(&mut self, bd: u8, validate: bool) -> Result<Vec<u8>, CodecError> {
        let major = bd >> 5;
        if bd & 0x1f != INFO_INDEFINITE {
            let n = self.uint_arg(bd)? as usize;
            let offset = self.rd.numread();
            let chunk = self.rd.readx(n)?;
            if validate && std::str::from_utf8(chunk).is_err() {
                return Err(CodecError::InvalidUtf8 { offset });
            }
            return Ok(chunk.to_vec());
        }
        let mut out = Vec::new();
        loop {
            let cb = self.rd.readn1()?;
            if cb == BD_BREAK {
                break;
            }
            if cb >> 5 != major || cb & 0x1f == INFO_INDEFINITE {
                return Err(self.malformed(cb));
            }
            let n = self.uint_arg(cb)? as usize;
            let offset = self.rd.numread();
            let chunk = self.rd.readx(n)?;
            if validate && std::str::from_utf8(chunk).is_err() {
                return Err(CodecError::InvalidUtf8 { offset });
            }
            out.extend_from_slice(chunk);
        }
        Ok(out)
    }

    fn read_bignum(&mut self) -> Result<u64, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        if bd >> 5 != MAJOR_BYTES {
            return Err(self.malformed(bd));
        }
        let raw = self.read_string_body(bd, false)?;
        let mag = match raw.iter().position(|&b| b != 0) {
            Some(i) => &raw[i..],
            None => &[][..],
        };
        if mag.len() > 8 {
            return Err(CodecError::Overflow {
                what: "bignum",
                offset: self.rd.numread(),
            });
        }
        let mut v = 0u64;
        for &b in mag {
            v = (v << 8) | b as u64;
        }
        Ok(v)
    }

    /// Decodes a tag 4 or tag 5 payload, an `[exponent, mantissa]` pair.
    fn read_exp_mant(&mut self) -> Result<(i64, i64), CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        if bd >> 5 != MAJOR_ARRAY || self.uint_arg(bd)? != 2 {
            return Err(self.malformed(bd));
        }
        let e = self.decode_i64()?;
        let m = self.decode_i64()?;
        Ok((e, m))
    }

    fn time_from_epoch(&mut self) -> Result<OffsetDateTime, CodecError> {
        let bd = self.read_bd_skip_tags()?;
        self.bd_read = false;
        match bd >> 5 {
            MAJOR_UINT => {
                let secs = num::u64_to_i64(self.uint_arg(bd)?, self.rd.numread())?;
                OffsetDateTime::from_unix_timestamp(secs)
                    .map_err(|e| CodecError::Time(e.to_string()))
            }
            MAJOR_NEGATIVE => {
                let arg = num::u64_to_i64(self.uint_arg(bd)?, self.rd.numread())?;
                OffsetDateTime::from_unix_timestamp(-1 - arg)
                    .map_err(|e| CodecError::Time(e.to_string()))
            }
            _ => {
                let f = self.read_float_with_bd(bd)?;
                if !f.is_finite() {
                    return Err(CodecError::Time("non-finite epoch seconds".into()));
                }
                OffsetDateTime::from_unix_timestamp_nanos((f * 1e9).round() as i128)
                    .map_err(|e| CodecError::Time(e.to_string()))
            }
        }
    }

    /// Consumes one complete value whose descriptor has already been read.
    fn skip_value_with_bd(&mut self, bd: u8) -> Result<(), CodecError> {
        match bd >> 5 {
            MAJOR_UINT | MAJOR_NEGATIVE => {
                self.uint_arg(bd)?;
            }
            MAJOR_BYTES | MAJOR_STR => {
                if bd & 0x1f == INFO_INDEFINITE {
                    loop {
                        let cb = self.rd.readn1()?;
                        if cb == BD_BREAK {
                            break;
                        }
                        if cb >> 5 != bd >> 5 || cb & 0x1f == INFO_INDEFINITE {
                            return Err(self.malformed(cb));
                        }
                        let n = self.uint_arg(cb)? as usize;
                        self.rd.skip(n)?;
                    }
                } else {
                    let n = self.uint_arg(bd)? as usize;
                    self.rd.skip(n)?;
                }
            }
            MAJOR_ARRAY | MAJOR_MAP => {
                let per: u128 = if bd >> 5 == MAJOR_MAP { 2 } else { 1 };
                if bd & 0x1f == INFO_INDEFINITE {
                    loop {
                        let nb = self.rd.readn1()?;
                        if nb == BD_BREAK {
                            break;
                        }
                        self.skip_value_with_bd(nb)?;
                    }
                } else {
                    let n = self.uint_arg(bd)? as u128 * per;
                    for _ in 0..n {
                        let nb = self.rd.readn1()?;
                        self.skip_value_with_bd(nb)?;
                    }
                }
            }
            MAJOR_TAG => {
                self.uint_arg(bd)?;
                let nb = self.rd.readn1()?;
                self.skip_value_with_bd(nb)?;
            }
            _ => match bd {
                BD_BREAK => return Err(self.malformed(bd)),
                BD_F16 => self.rd.skip(2)?,
                BD_F32 => self.rd.skip(4)?,
                BD_F64 => self.rd.skip(8)?,
                0xf8 => self.rd.skip(1)?,
                _ => {}
            },
        }
        Ok(())
    }

    /// Returns the raw encoded bytes of the next value, including the
    /// descriptor even when it has already been peeked.
    fn capture_value_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        self.rd.start_recording();
        let walked = self.skip_value_with_bd(bd);
        let mut rest = self.rd.stop_recording();
        walked?;
        let mut out = Vec::with_capacity(rest.len() + 1);
        out.push(bd);
        out.append(&mut rest);
        Ok(out)
    }

    /// Reads the payload of a registered tag: a byte string when the encoder
    /// wrapped one, otherwise the raw bytes of whatever value follows.
    fn read_ext_payload(&mut self) -> Result<Vec<u8>, CodecError> {
        let bd = self.read_bd()?;
        if bd >> 5 == MAJOR_BYTES {
            self.bd_read = false;
            self.read_string_body(bd, false)
        } else {
            self.capture_value_bytes()
        }
    }
}

impl<'h, R: WireRead> Decoder for CborDecoder<'h, R> {
    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn try_nil(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd()?;
        if bd == BD_NIL || bd == BD_UNDEFINED {
            self.bd_read = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn container_kind(&mut self) -> Result<ContainerKind, CodecError> {
        let bd = self.read_bd()?;
        Ok(match bd >> 5 {
            MAJOR_BYTES => ContainerKind::Bytes,
            MAJOR_STR => ContainerKind::Str,
            MAJOR_ARRAY => ContainerKind::Array,
            MAJOR_MAP => ContainerKind::Map,
            _ if bd == BD_NIL || bd == BD_UNDEFINED => ContainerKind::Nil,
            _ => ContainerKind::Other,
        })
    }

    fn read_array_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(if self.h.nil_collection_to_zero_length {
                Len::Known(0)
            } else {
                Len::Nil
            });
        }
        let bd = self.read_bd()?;
        if bd >> 5 != MAJOR_ARRAY {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        if bd & 0x1f == INFO_INDEFINITE {
            Ok(Len::Indefinite)
        } else {
            Ok(Len::Known(self.uint_arg(bd)? as usize))
        }
    }

    fn read_map_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(if self.h.nil_collection_to_zero_length {
                Len::Known(0)
            } else {
                Len::Nil
            });
        }
        let bd = self.read_bd()?;
        if bd >> 5 != MAJOR_MAP {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        if bd & 0x1f == INFO_INDEFINITE {
            Ok(Len::Indefinite)
        } else {
            Ok(Len::Known(self.uint_arg(bd)? as usize))
        }
    }

    fn check_break(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd()?;
        if bd == BD_BREAK {
            self.bd_read = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn decode_bool(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd_skip_tags()?;
        self.bd_read = false;
        match bd {
            BD_FALSE => Ok(false),
            BD_TRUE => Ok(true),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_i64(&mut self) -> Result<i64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd_skip_tags()?;
        self.bd_read = false;
        match bd >> 5 {
            MAJOR_UINT => num::u64_to_i64(self.uint_arg(bd)?, self.rd.numread()),
            MAJOR_NEGATIVE => {
                let arg = num::u64_to_i64(self.uint_arg(bd)?, self.rd.numread())?;
                Ok(-1 - arg)
            }
            _ => {
                let f = self.read_float_with_bd(bd)?;
                num::f64_to_i64(f, self.rd.numread())
            }
        }
    }

    fn decode_u64(&mut self) -> Result<u64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd_skip_tags()?;
        self.bd_read = false;
        match bd >> 5 {
            MAJOR_UINT => self.uint_arg(bd),
            MAJOR_NEGATIVE => {
                self.uint_arg(bd)?;
                Err(CodecError::Overflow {
                    what: "negative integer",
                    offset: self.rd.numread(),
                })
            }
            _ => {
                let f = self.read_float_with_bd(bd)?;
                num::f64_to_u64(f, self.rd.numread())
            }
        }
    }

    fn decode_f64(&mut self) -> Result<f64, CodecError> {
        if self.try_nil()? {
            return Ok(0.0);
        }
        let bd = self.read_bd_skip_tags()?;
        self.bd_read = false;
        match bd >> 5 {
            MAJOR_UINT => Ok(self.uint_arg(bd)? as f64),
            MAJOR_NEGATIVE => Ok(-1.0 - self.uint_arg(bd)? as f64),
            _ => self.read_float_with_bd(bd),
        }
    }

    fn decode_f32(&mut self) -> Result<f32, CodecError> {
        let f = self.decode_f64()?;
        if f.is_finite() && (f as f32).is_infinite() {
            return Err(CodecError::Overflow {
                what: "float",
                offset: self.rd.numread(),
            });
        }
        Ok(f as f32)
    }

    fn decode_str_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let bd = self.read_bd_skip_tags()?;
        if bd >> 5 != MAJOR_STR && bd >> 5 != MAJOR_BYTES {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let validate = bd >> 5 == MAJOR_STR && self.h.basic.validate_utf8;
        self.read_string_body(bd, validate)
    }

    fn decode_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let bd = self.read_bd_skip_tags()?;
        match bd >> 5 {
            MAJOR_BYTES | MAJOR_STR => {
                self.bd_read = false;
                self.read_string_body(bd, false)
            }
            MAJOR_ARRAY => {
                self.bd_read = false;
                let mut out = Vec::new();
                if bd & 0x1f == INFO_INDEFINITE {
                    while !self.check_break()? {
                        let v = self.decode_u64()?;
                        out.push(byte_checked(v, self.rd.numread())?);
                    }
                } else {
                    let n = self.uint_arg(bd)? as usize;
                    out.reserve(crate::codec::init_cap(n, 1, self.h.basic.max_init_len));
                    for _ in 0..n {
                        let v = self.decode_u64()?;
                        out.push(byte_checked(v, self.rd.numread())?);
                    }
                }
                Ok(out)
            }
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_time(&mut self) -> Result<OffsetDateTime, CodecError> {
        let bd = self.read_bd()?;
        if bd >> 5 != MAJOR_TAG {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        match self.uint_arg(bd)? {
            TAG_TIME_STRING => {
                let s = self.decode_str()?;
                OffsetDateTime::parse(&s, &Rfc3339).map_err(|e| CodecError::Time(e.to_string()))
            }
            TAG_TIME_EPOCH => self.time_from_epoch(),
            other => Err(CodecError::WrongExtTag {
                expected: TAG_TIME_EPOCH,
                actual: other,
            }),
        }
    }

    fn decode_ext(&mut self, tag: u64) -> Result<Vec<u8>, CodecError> {
        let bd = self.read_bd()?;
        if bd >> 5 != MAJOR_TAG {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let actual = self.uint_arg(bd)?;
        if actual != tag {
            return Err(CodecError::WrongExtTag {
                expected: tag,
                actual,
            });
        }
        self.read_ext_payload()
    }

    fn decode_raw_ext(&mut self) -> Result<RawExt, CodecError> {
        let bd = self.read_bd()?;
        if bd >> 5 != MAJOR_TAG {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let tag = self.uint_arg(bd)?;
        let data = self.capture_value_bytes()?;
        Ok(RawExt::new(tag, data))
    }

    fn decode_naked(&mut self) -> Result<Naked, CodecError> {
        loop {
            let bd = self.read_bd()?;
            match bd >> 5 {
                MAJOR_UINT => {
                    self.bd_read = false;
                    let u = self.uint_arg(bd)?;
                    return if self.h.basic.signed_integer {
                        Ok(Naked::Int(num::u64_to_i64(u, self.rd.numread())?))
                    } else {
                        Ok(Naked::Uint(u))
                    };
                }
                MAJOR_NEGATIVE => {
                    self.bd_read = false;
                    let arg = num::u64_to_i64(self.uint_arg(bd)?, self.rd.numread())?;
                    return Ok(Naked::Int(-1 - arg));
                }
                MAJOR_BYTES => {
                    self.bd_read = false;
                    return Ok(Naked::Bytes(self.read_string_body(bd, false)?));
                }
                MAJOR_STR => {
                    self.bd_read = false;
                    let offset = self.rd.numread();
                    let raw = self.read_string_body(bd, self.h.basic.validate_utf8)?;
                    let s = String::from_utf8(raw)
                        .map_err(|_| CodecError::InvalidUtf8 { offset })?;
                    return Ok(Naked::Str(s));
                }
                MAJOR_ARRAY => return Ok(Naked::Array),
                MAJOR_MAP => return Ok(Naked::Map),
                MAJOR_TAG => {
                    self.bd_read = false;
                    let tag = self.uint_arg(bd)?;
                    match tag {
                        TAG_SELF_DESCRIBE => continue,
                        TAG_TIME_STRING | TAG_TIME_EPOCH => {
                            return if tag == TAG_TIME_STRING {
                                let s = self.decode_str()?;
                                OffsetDateTime::parse(&s, &Rfc3339)
                                    .map(Naked::Time)
                                    .map_err(|e| CodecError::Time(e.to_string()))
                            } else {
                                self.time_from_epoch().map(Naked::Time)
                            };
                        }
                        TAG_POS_BIGNUM => {
                            let u = self.read_bignum()?;
                            return Ok(Naked::Uint(u));
                        }
                        TAG_NEG_BIGNUM => {
                            let u = self.read_bignum()?;
                            if u > i64::MAX as u64 {
                                return Err(CodecError::Overflow {
                                    what: "bignum",
                                    offset: self.rd.numread(),
                                });
                            }
                            return Ok(Naked::Int(-1 - u as i64));
                        }
                        TAG_DECIMAL_FRACTION => {
                            let (e, m) = self.read_exp_mant()?;
                            let f = format!("{}e{}", m, e)
                                .parse::<f64>()
                                .map_err(|_| CodecError::Overflow {
                                    what: "decimal fraction",
                                    offset: self.rd.numread(),
                                })?;
                            return Ok(Naked::Float(f));
                        }
                        TAG_BIGFLOAT => {
                            let (e, m) = self.read_exp_mant()?;
                            return Ok(Naked::Float((m as f64) * 2f64.powi(e as i32)));
                        }
                        _ => {
                            if self.h.basic.extensions().lookup(tag).is_some() {
                                let data = self.read_ext_payload()?;
                                return Ok(Naked::Ext { tag, data });
                            }
                            if self.h.skip_unexpected_tags {
                                continue;
                            }
                            let data = self.capture_value_bytes()?;
                            return Ok(Naked::Ext { tag, data });
                        }
                    }
                }
                _ => {
                    return match bd {
                        BD_FALSE => {
                            self.bd_read = false;
                            Ok(Naked::Bool(false))
                        }
                        BD_TRUE => {
                            self.bd_read = false;
                            Ok(Naked::Bool(true))
                        }
                        BD_NIL | BD_UNDEFINED => {
                            self.bd_read = false;
                            Ok(Naked::Nil)
                        }
                        BD_F16 | BD_F32 | BD_F64 => {
                            self.bd_read = false;
                            Ok(Naked::Float(self.read_float_with_bd(bd)?))
                        }
                        _ => Err(self.malformed(bd)),
                    };
                }
            }
        }
    }

    fn num_bytes_read(&self) -> usize {
        self.rd.numread()
    }

    fn descriptor_pending(&self) -> bool {
        self.bd_read
    }

    fn start_recording(&mut self) {
        self.rd.start_recording();
    }

    fn stop_recording(&mut self) -> Vec<u8> {
        self.rd.stop_recording()
    }

    fn depth_incr(&mut self) -> Result<(), CodecError> {
        self.depth += 1;
        if self.depth > self.h.basic.max_depth {
            return Err(CodecError::DepthExceeded);
        }
        Ok(())
    }

    fn depth_decr(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn next_value_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        self.capture_value_bytes()
    }

    fn value_from_slice(&self, data: &[u8]) -> Result<Value, CodecError> {
        let mut d = CborDecoder::new(self.h, SliceReader::new(data));
        read_value(&mut d)
    }
}

fn byte_checked(v: u64, offset: usize) -> Result<u8, CodecError> {
    u8::try_from(v).map_err(|_| CodecError::Overflow {
        what: "byte",
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn decode(data: &[u8]) -> Value {
        CborHandle::new().decode_value(data).unwrap()
    }

    #[test]
    fn scalar_vectors() {
        assert_eq!(decode(&hex!("0a")), Value::Uint(10));
        assert_eq!(decode(&hex!("1903e8")), Value::Uint(1000));
        assert_eq!(decode(&hex!("20")), Value::Int(-1));
        assert_eq!(decode(&hex!("3863")), Value::Int(-100));
        assert_eq!(decode(&hex!("f4")), Value::Bool(false));
        assert_eq!(decode(&hex!("f6")), Value::Nil);
        assert_eq!(decode(&hex!("f7")), Value::Nil);
    }

    #[test]
    fn string_and_bytes_vectors() {
        assert_eq!(decode(&hex!("6449455446")), Value::Str("IETF".into()));
        assert_eq!(decode(&hex!("4401020304")), Value::Bytes(vec![1, 2, 3, 4]));
        // indefinite text string in two chunks
        assert_eq!(
            decode(&hex!("7f62494562544fff")),
            Value::Str("IETO".into())
        );
    }

    #[test]
    fn float_vectors() {
        assert_eq!(
            decode(&hex!("fb3ff199999999999a")),
            Value::Float(1.1)
        );
        assert_eq!(decode(&hex!("f93c00")), Value::Float(1.0));
        assert_eq!(decode(&hex!("f90000")), Value::Float(0.0));
        assert_eq!(decode(&hex!("fa47c35000")), Value::Float(100000.0));
        match decode(&hex!("f97e00")) {
            Value::Float(f) => assert!(f.is_nan()),
            v => panic!("expected nan, got {:?}", v),
        }
    }

    #[test]
    fn containers_definite_and_indefinite() {
        assert_eq!(
            decode(&hex!("83010203")),
            Value::Array(vec![Value::Uint(1), Value::Uint(2), Value::Uint(3)])
        );
        assert_eq!(
            decode(&hex!("9f0102ff")),
            Value::Array(vec![Value::Uint(1), Value::Uint(2)])
        );
        assert_eq!(
            decode(&hex!("a16161f5")),
            Value::Map(vec![(Value::Str("a".into()), Value::Bool(true))])
        );
        assert_eq!(
            decode(&hex!("bf6161f4ff")),
            Value::Map(vec![(Value::Str("a".into()), Value::Bool(false))])
        );
    }

    #[test]
    fn bignums_within_u64_range() {
        // tag 2, 9-byte content with a leading zero still fits
        assert_eq!(
            decode(&hex!("c249000000000000000001")),
            Value::Uint(1)
        );
        assert_eq!(decode(&hex!("c34101")), Value::Int(-2));
        assert_eq!(
            decode(&hex!("c3487fffffffffffffff")),
            Value::Int(i64::MIN)
        );
    }

    #[test]
    fn oversized_bignum_is_overflow() {
        let err = CborHandle::new()
            .decode_value(&hex!("c249010000000000000001"))
            .unwrap_err();
        assert!(matches!(err, CodecError::Overflow { .. }));
    }

    #[test]
    fn decimal_fraction_and_bigfloat() {
        // tag 4: [-2, 27315] = 273.15
        assert_eq!(decode(&hex!("c48221196ab3")), Value::Float(273.15));
        // tag 5: [-1, 3] = 1.5
        assert_eq!(decode(&hex!("c5822003")), Value::Float(1.5));
    }

    #[test]
    fn self_describe_tag_is_transparent() {
        assert_eq!(decode(&hex!("d9d9f70a")), Value::Uint(10));
    }

    #[test]
    fn unknown_tag_preserved_as_ext() {
        let v = decode(&hex!("d8654401020304"));
        assert_eq!(
            v,
            Value::Ext(RawExt::new(101, hex!("4401020304").to_vec()))
        );
    }

    #[test]
    fn skip_unexpected_tags_unwraps() {
        let mut h = CborHandle::new();
        h.skip_unexpected_tags = true;
        assert_eq!(h.decode_value(&hex!("d86518c8")).unwrap(), Value::Uint(200));
    }

    #[test]
    fn epoch_time_tag() {
        let v = decode(&hex!("c11a514b67b0"));
        assert_eq!(
            v,
            Value::Time(OffsetDateTime::from_unix_timestamp(1363896240).unwrap())
        );
    }

    #[test]
    fn invalid_chunk_utf8_rejected_eagerly() {
        let mut h = CborHandle::new();
        h.basic.validate_utf8 = true;
        // two chunks splitting a multi-byte codepoint
        let err = h.decode_value(&hex!("7f61e262828cff")).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8 { .. }));
    }

    #[test]
    fn truncated_input_reports_offset() {
        let err = CborHandle::new().decode_value(&hex!("1903")).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn next_value_bytes_spans_nested_containers() {
        let data = hex!("82a26161016162820203f5");
        let h = CborHandle::new();
        let mut d = h.decoder(&data);
        assert_eq!(d.read_array_start().unwrap(), Len::Known(2));
        let first = d.next_value_bytes().unwrap();
        assert_eq!(first, hex!("a26161016162820203"));
        assert_eq!(d.decode_bool().unwrap(), true);
    }
}
