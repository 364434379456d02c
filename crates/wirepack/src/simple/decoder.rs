//! Simple format decode driver.

use time::OffsetDateTime;
use wirepack_buffers::{SliceReader, WireRead};

use super::constants::*;
use crate::codec::{read_value, Decoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, SimpleHandle};
use crate::num;
use crate::value::{ContainerKind, Len, Naked, Value};

pub struct SimpleDecoder<'h, R> {
    h: &'h SimpleHandle,
    rd: R,
    bd: u8,
    bd_read: bool,
    depth: u16,
}

impl<'h, R: WireRead> SimpleDecoder<'h, R> {
    pub(crate) fn new(h: &'h SimpleHandle, rd: R) -> Self {
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

    /// Magnitude of an integer descriptor (`bd - base` selects the width).
    fn read_magnitude(&mut self, form: u8) -> Result<u64, CodecError> {
        Ok(match form {
            0 => self.rd.readn1()? as u64,
            1 => u16::from_be_bytes(self.rd.readn2()?) as u64,
            2 => u32::from_be_bytes(self.rd.readn4()?) as u64,
            _ => u64::from_be_bytes(self.rd.readn8()?),
        })
    }

    /// Container length for `bd - base` in 0..=4.
    fn read_len_form(&mut self, form: u8) -> Result<usize, CodecError> {
        Ok(match form {
            0 => 0,
            1 => self.rd.readn1()? as usize,
            2 => u16::from_be_bytes(self.rd.readn2()?) as usize,
            3 => u32::from_be_bytes(self.rd.readn4()?) as usize,
            _ => {
                let v = u64::from_be_bytes(self.rd.readn8()?);
                usize::try_from(v).map_err(|_| CodecError::Overflow {
                    what: "length",
                    offset: self.rd.numread(),
                })?
            }
        })
    }

    fn neg_from_magnitude(&self, mag: u64) -> Result<i64, CodecError> {
        if mag > 1u64 << 63 {
            return Err(CodecError::Overflow {
                what: "negative integer",
                offset: self.rd.numread(),
            });
        }
        Ok((-(mag as i128)) as i64)
    }

    fn time_from_payload(&self, data: &[u8]) -> Result<OffsetDateTime, CodecError> {
        let (sec, nsec) = match data.len() {
            8 => (
                i64::from_be_bytes(data.try_into().map_err(|_| {
                    CodecError::Internal("timestamp payload length changed")
                })?),
                0u32,
            ),
            12 => {
                let sec = i64::from_be_bytes([
                    data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
                ]);
                let nsec = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
                (sec, nsec)
            }
            n => {
                return Err(CodecError::Time(format!(
                    "timestamp payload must be 8 or 12 bytes, got {}",
                    n
                )))
            }
        };
        if nsec >= 1_000_000_000 {
            return Err(CodecError::Time(format!(
                "nanoseconds out of range: {}",
                nsec
            )));
        }
        OffsetDateTime::from_unix_timestamp_nanos(sec as i128 * 1_000_000_000 + nsec as i128)
            .map_err(|e| CodecError::Time(e.to_string()))
    }

    /// Consumes one complete value whose descriptor has already been read.
    fn skip_value_with_bd(&mut self, bd: u8) -> Result<(), CodecError> {
        match bd {
            SD_NIL | SD_FALSE | SD_TRUE => {}
            SD_F32 => self.rd.skip(4)?,
            SD_F64 => self.rd.skip(8)?,
            SD_POS_INT..=11 | SD_NEG_INT..=15 => {
                self.rd.skip(1 << ((bd & 3) as usize))?;
            }
            SD_TIME => {
                let n = self.rd.readn1()? as usize;
                self.rd.skip(n)?;
            }
            SD_STR..=220 | SD_BYTES..=228 => {
                let n = self.read_len_form(bd & 7)?;
                self.rd.skip(n)?;
            }
            SD_ARRAY..=236 | SD_MAP..=244 => {
                let per = if bd >= SD_MAP { 2 } else { 1 };
                let n = self.read_len_form(bd & 7)?;
                for _ in 0..n * per {
                    let nb = self.rd.readn1()?;
                    self.skip_value_with_bd(nb)?;
                }
            }
            SD_EXT..=252 => {
                let n = self.read_len_form(bd & 7)?;
                self.rd.skip(1 + n)?;
            }
            _ => return Err(self.malformed(bd)),
        }
        Ok(())
    }

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

    fn read_ext_body(&mut self, bd: u8) -> Result<(u8, Vec<u8>), CodecError> {
        let n = self.read_len_form(bd & 7)?;
        let tag = self.rd.readn1()?;
        Ok((tag, self.rd.readx(n)?.to_vec()))
    }
}

impl<'h, R: WireRead> Decoder for SimpleDecoder<'h, R> {
    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn try_nil(&mut self) -> Result<bool, CodecError> {
        if self.read_bd()? == SD_NIL {
            self.bd_read = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn container_kind(&mut self) -> Result<ContainerKind, CodecError> {
        Ok(match self.read_bd()? {
            SD_NIL => ContainerKind::Nil,
            SD_BYTES..=228 => ContainerKind::Bytes,
            SD_STR..=220 => ContainerKind::Str,
            SD_ARRAY..=236 => ContainerKind::Array,
            SD_MAP..=244 => ContainerKind::Map,
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
        if !(SD_ARRAY..=236).contains(&bd) {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        Ok(Len::Known(self.read_len_form(bd & 7)?))
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
        if !(SD_MAP..=244).contains(&bd) {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        Ok(Len::Known(self.read_len_form(bd & 7)?))
    }

    fn check_break(&mut self) -> Result<bool, CodecError> {
        Ok(false)
    }

    fn decode_bool(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            SD_NIL | SD_FALSE => Ok(false),
            SD_TRUE => Ok(true),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_i64(&mut self) -> Result<i64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            SD_POS_INT..=11 => {
                let mag = self.read_magnitude(bd & 3)?;
                num::u64_to_i64(mag, self.rd.numread())
            }
            SD_NEG_INT..=15 => {
                let mag = self.read_magnitude(bd & 3)?;
                self.neg_from_magnitude(mag)
            }
            SD_F32 => num::f64_to_i64(
                f32::from_be_bytes(self.rd.readn4()?) as f64,
                self.rd.numread(),
            ),
            SD_F64 => num::f64_to_i64(f64::from_be_bytes(self.rd.readn8()?), self.rd.numread()),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_u64(&mut self) -> Result<u64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            SD_POS_INT..=11 => self.read_magnitude(bd & 3),
            SD_NEG_INT..=15 => {
                self.read_magnitude(bd & 3)?;
                Err(CodecError::Overflow {
                    what: "negative integer",
                    offset: self.rd.numread(),
                })
            }
            SD_F32 => num::f64_to_u64(
                f32::from_be_bytes(self.rd.readn4()?) as f64,
                self.rd.numread(),
            ),
            SD_F64 => num::f64_to_u64(f64::from_be_bytes(self.rd.readn8()?), self.rd.numread()),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_f64(&mut self) -> Result<f64, CodecError> {
        if self.try_nil()? {
            return Ok(0.0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            SD_F32 => Ok(f32::from_be_bytes(self.rd.readn4()?) as f64),
            SD_F64 => Ok(f64::from_be_bytes(self.rd.readn8()?)),
            SD_POS_INT..=11 => Ok(self.read_magnitude(bd & 3)? as f64),
            SD_NEG_INT..=15 => Ok(-(self.read_magnitude(bd & 3)? as f64)),
            _ => Err(self.malformed(bd)),
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
        let bd = self.read_bd()?;
        if !(SD_STR..=220).contains(&bd) && !(SD_BYTES..=228).contains(&bd) {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let n = self.read_len_form(bd & 7)?;
        Ok(self.rd.readx(n)?.to_vec())
    }

    fn decode_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let bd = self.read_bd()?;
        if (SD_ARRAY..=236).contains(&bd) {
            let n = match self.read_array_start()? {
                Len::Known(n) => n,
                _ => 0,
            };
            let mut out =
                Vec::with_capacity(crate::codec::init_cap(n, 1, self.h.basic.max_init_len));
            for _ in 0..n {
                let v = self.decode_u64()?;
                let b = u8::try_from(v).map_err(|_| CodecError::Overflow {
                    what: "byte",
                    offset: self.rd.numread(),
                })?;
                out.push(b);
            }
            return Ok(out);
        }
        self.decode_str_bytes()
    }

    fn decode_time(&mut self) -> Result<OffsetDateTime, CodecError> {
        let bd = self.read_bd()?;
        if bd != SD_TIME {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let n = self.rd.readn1()? as usize;
        let data = self.rd.readx(n)?.to_vec();
        self.time_from_payload(&data)
    }

    fn decode_ext(&mut self, tag: u64) -> Result<Vec<u8>, CodecError> {
        let bd = self.read_bd()?;
        if !(SD_EXT..=252).contains(&bd) {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let (actual, data) = self.read_ext_body(bd)?;
        if actual as u64 != tag {
            return Err(CodecError::WrongExtTag {
                expected: tag,
                actual: actual as u64,
            });
        }
        Ok(data)
    }

    fn decode_raw_ext(&mut self) -> Result<RawExt, CodecError> {
        let bd = self.read_bd()?;
        if !(SD_EXT..=252).contains(&bd) {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let (tag, data) = self.read_ext_body(bd)?;
        Ok(RawExt::new(tag as u64, data))
    }

    fn decode_naked(&mut self) -> Result<Naked, CodecError> {
        let bd = self.read_bd()?;
        match bd {
            SD_NIL => {
                self.bd_read = false;
                Ok(Naked::Nil)
            }
            SD_FALSE => {
                self.bd_read = false;
                Ok(Naked::Bool(false))
            }
            SD_TRUE => {
                self.bd_read = false;
                Ok(Naked::Bool(true))
            }
            SD_F32 => {
                self.bd_read = false;
                Ok(Naked::Float(f32::from_be_bytes(self.rd.readn4()?) as f64))
            }
            SD_F64 => {
                self.bd_read = false;
                Ok(Naked::Float(f64::from_be_bytes(self.rd.readn8()?)))
            }
            SD_POS_INT..=11 => {
                self.bd_read = false;
                let mag = self.read_magnitude(bd & 3)?;
                if self.h.basic.signed_integer {
                    Ok(Naked::Int(num::u64_to_i64(mag, self.rd.numread())?))
                } else {
                    Ok(Naked::Uint(mag))
                }
            }
            SD_NEG_INT..=15 => {
                self.bd_read = false;
                let mag = self.read_magnitude(bd & 3)?;
                Ok(Naked::Int(self.neg_from_magnitude(mag)?))
            }
            SD_TIME => {
                self.bd_read = false;
                let n = self.rd.readn1()? as usize;
                let data = self.rd.readx(n)?.to_vec();
                Ok(Naked::Time(self.time_from_payload(&data)?))
            }
            SD_STR..=220 => {
                self.bd_read = false;
                let n = self.read_len_form(bd & 7)?;
                let offset = self.rd.numread();
                let raw = self.rd.readx(n)?.to_vec();
                let s = String::from_utf8(raw)
                    .map_err(|_| CodecError::InvalidUtf8 { offset })?;
                Ok(Naked::Str(s))
            }
            SD_BYTES..=228 => {
                self.bd_read = false;
                let n = self.read_len_form(bd & 7)?;
                Ok(Naked::Bytes(self.rd.readx(n)?.to_vec()))
            }
            SD_ARRAY..=236 => Ok(Naked::Array),
            SD_MAP..=244 => Ok(Naked::Map),
            SD_EXT..=252 => {
                self.bd_read = false;
                let (tag, data) = self.read_ext_body(bd)?;
                Ok(Naked::Ext {
                    tag: tag as u64,
                    data,
                })
            }
            _ => Err(self.malformed(bd)),
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
        let mut d = SimpleDecoder::new(self.h, SliceReader::new(data));
        read_value(&mut d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoder;
    use hex_literal::hex;
    use time::macros::datetime;

    fn round_trip(v: &Value) {
        let h = SimpleHandle::new();
        let bytes = h.encode_value(v).unwrap();
        assert_eq!(&h.decode_value(&bytes).unwrap(), v);
    }

    #[test]
    fn round_trips() {
        round_trip(&Value::Nil);
        round_trip(&Value::Bool(true));
        round_trip(&Value::Uint(0));
        round_trip(&Value::Uint(u64::MAX));
        round_trip(&Value::Int(i64::MIN));
        round_trip(&Value::Float(-2.5));
        round_trip(&Value::Str("hello".into()));
        round_trip(&Value::Bytes(vec![0, 255, 3]));
        round_trip(&Value::Time(datetime!(2020-05-05 10:20:30.5 UTC)));
        round_trip(&Value::Array(vec![
            Value::Uint(1),
            Value::Map(vec![(Value::Str("k".into()), Value::Nil)]),
        ]));
    }

    #[test]
    fn nil_collection_handling() {
        let mut h = SimpleHandle::new();
        {
            let mut d = h.decoder(&hex!("01"));
            assert_eq!(d.read_array_start().unwrap(), Len::Nil);
        }
        h.nil_collection_to_zero_length = true;
        let mut d = h.decoder(&hex!("01"));
        assert_eq!(d.read_array_start().unwrap(), Len::Known(0));
    }

    #[test]
    fn bytes_from_uint_array() {
        let h = SimpleHandle::new();
        // array of two one-byte uints
        let mut d = h.decoder(&hex!("e90208010802"));
        assert_eq!(d.decode_bytes().unwrap(), vec![1, 2]);
    }

    #[test]
    fn ext_tag_checked() {
        let h = SimpleHandle::new();
        let mut enc = h.encoder();
        enc.encode_ext(5, &[1, 2, 3]).unwrap();
        let bytes = enc.writer.take();
        assert_eq!(bytes, hex!("f90305010203"));
        let mut d = h.decoder(&bytes);
        assert!(matches!(
            d.decode_ext(6),
            Err(CodecError::WrongExtTag { .. })
        ));
        let mut d = h.decoder(&bytes);
        assert_eq!(d.decode_ext(5).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn skip_walker() {
        let h = SimpleHandle::new();
        let data = hex!("e9020807d901780803");
        let mut d = h.decoder(&data);
        assert_eq!(d.next_value_bytes().unwrap(), hex!("e9020807d90178"));
        assert_eq!(d.decode_u64().unwrap(), 3);
    }
}
