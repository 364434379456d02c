//! MessagePack decode driver.

use time::OffsetDateTime;
use wirepack_buffers::{SliceReader, WireRead};

use super::constants::*;
use crate::codec::{read_value, Decoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, MsgpackHandle};
use crate::num;
use crate::value::{ContainerKind, Len, Naked, Value};

pub struct MsgpackDecoder<'h, R> {
    h: &'h MsgpackHandle,
    rd: R,
    bd: u8,
    bd_read: bool,
    depth: u16,
}

impl<'h, R: WireRead> MsgpackDecoder<'h, R> {
    pub(crate) fn new(h: &'h MsgpackHandle, rd: R) -> Self {
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

    fn overflow(&self, what: &'static str) -> CodecError {
        CodecError::Overflow {
            what,
            offset: self.rd.numread(),
        }
    }

    /// Length of a str/raw container whose descriptor is `bd`, or None when
    /// `bd` is not in that family.
    fn str_len(&mut self, bd: u8) -> Result<Option<usize>, CodecError> {
        Ok(Some(match bd {
            MP_STR8 => self.rd.readn1()? as usize,
            MP_STR16 => u16::from_be_bytes(self.rd.readn2()?) as usize,
            MP_STR32 => u32::from_be_bytes(self.rd.readn4()?) as usize,
            _ if (MP_FIX_STR..=0xbf).contains(&bd) => (bd & 0x1f) as usize,
            _ => return Ok(None),
        }))
    }

    fn bin_len(&mut self, bd: u8) -> Result<Option<usize>, CodecError> {
        Ok(Some(match bd {
            MP_BIN8 => self.rd.readn1()? as usize,
            MP_BIN16 => u16::from_be_bytes(self.rd.readn2()?) as usize,
            MP_BIN32 => u32::from_be_bytes(self.rd.readn4()?) as usize,
            _ => return Ok(None),
        }))
    }

    /// Reads an extension header and returns (tag byte, payload length).
    fn read_ext_hdr(&mut self, bd: u8) -> Result<(u8, usize), CodecError> {
        let len = match bd {
            MP_FIXEXT1 => 1,
            MP_FIXEXT2 => 2,
            MP_FIXEXT4 => 4,
            MP_FIXEXT8 => 8,
            MP_FIXEXT16 => 16,
            MP_EXT8 => self.rd.readn1()? as usize,
            MP_EXT16 => u16::from_be_bytes(self.rd.readn2()?) as usize,
            MP_EXT32 => u32::from_be_bytes(self.rd.readn4()?) as usize,
            _ => return Err(self.malformed(bd)),
        };
        let tag = self.rd.readn1()?;
        Ok((tag, len))
    }

    fn time_from_payload(&self, data: &[u8]) -> Result<OffsetDateTime, CodecError> {
        let (sec, nsec) = match data.len() {
            4 => (
                u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as i64,
                0u32,
            ),
            8 => {
                let v = u64::from_be_bytes(data.try_into().map_err(|_| {
                    CodecError::Internal("timestamp payload length changed")
                })?);
                ((v & 0x3_ffff_ffff) as i64, (v >> 34) as u32)
            }
            12 => {
                let nsec = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                let sec = i64::from_be_bytes([
                    data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
                ]);
                (sec, nsec)
            }
            n => {
                return Err(CodecError::Time(format!(
                    "timestamp payload must be 4, 8 or 12 bytes, got {}",
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
            0x00..=MP_POS_FIX_MAX | MP_NEG_FIX_MIN..=0xff | MP_NIL | MP_FALSE | MP_TRUE => {}
            MP_UINT8 | MP_INT8 => self.rd.skip(1)?,
            MP_UINT16 | MP_INT16 => self.rd.skip(2)?,
            MP_UINT32 | MP_INT32 | MP_F32 => self.rd.skip(4)?,
            MP_UINT64 | MP_INT64 | MP_F64 => self.rd.skip(8)?,
            _ => {
                if let Some(n) = self.str_len(bd)?.or(self.bin_len(bd)?) {
                    self.rd.skip(n)?;
                } else if let Some(n) = self.container_len(bd)? {
                    let pairs = if bd >= MP_FIX_MAP && bd <= 0x8f || bd == MP_MAP16 || bd == MP_MAP32
                    {
                        2
                    } else {
                        1
                    };
                    for _ in 0..n * pairs {
                        let nb = self.rd.readn1()?;
                        self.skip_value_with_bd(nb)?;
                    }
                } else {
                    let (_, n) = self.read_ext_hdr(bd)?;
                    self.rd.skip(n)?;
                }
            }
        }
        Ok(())
    }

    /// Element count of an array/map descriptor, or None for other kinds.
    fn container_len(&mut self, bd: u8) -> Result<Option<usize>, CodecError> {
        Ok(Some(match bd {
            _ if (MP_FIX_ARRAY..=0x9f).contains(&bd) => (bd & 0x0f) as usize,
            _ if (MP_FIX_MAP..=0x8f).contains(&bd) => (bd & 0x0f) as usize,
            MP_ARRAY16 | MP_MAP16 => u16::from_be_bytes(self.rd.readn2()?) as usize,
            MP_ARRAY32 | MP_MAP32 => u32::from_be_bytes(self.rd.readn4()?) as usize,
            _ => return Ok(None),
        }))
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

    fn is_str_family(bd: u8) -> bool {
        matches!(bd, MP_STR8 | MP_STR16 | MP_STR32) || (MP_FIX_STR..=0xbf).contains(&bd)
    }

    fn read_int_with_bd(&mut self, bd: u8) -> Result<i64, CodecError> {
        match bd {
            0x00..=MP_POS_FIX_MAX => Ok(bd as i64),
            MP_NEG_FIX_MIN..=0xff => Ok(bd as i8 as i64),
            MP_UINT8 => Ok(self.rd.readn1()? as i64),
            MP_UINT16 => Ok(u16::from_be_bytes(self.rd.readn2()?) as i64),
            MP_UINT32 => Ok(u32::from_be_bytes(self.rd.readn4()?) as i64),
            MP_UINT64 => num::u64_to_i64(
                u64::from_be_bytes(self.rd.readn8()?),
                self.rd.numread(),
            ),
            MP_INT8 => Ok(self.rd.readn1()? as i8 as i64),
            MP_INT16 => Ok(i16::from_be_bytes(self.rd.readn2()?) as i64),
            MP_INT32 => Ok(i32::from_be_bytes(self.rd.readn4()?) as i64),
            MP_INT64 => Ok(i64::from_be_bytes(self.rd.readn8()?)),
            MP_F32 => num::f64_to_i64(
                f32::from_be_bytes(self.rd.readn4()?) as f64,
                self.rd.numread(),
            ),
            MP_F64 => num::f64_to_i64(f64::from_be_bytes(self.rd.readn8()?), self.rd.numread()),
            _ => Err(self.malformed(bd)),
        }
    }
}

impl<'h, R: WireRead> Decoder for MsgpackDecoder<'h, R> {
    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn try_nil(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd()?;
        if bd == MP_NIL {
            self.bd_read = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn container_kind(&mut self) -> Result<ContainerKind, CodecError> {
        let bd = self.read_bd()?;
        Ok(match bd {
            MP_NIL => ContainerKind::Nil,
            MP_BIN8 | MP_BIN16 | MP_BIN32 => ContainerKind::Bytes,
            MP_ARRAY16 | MP_ARRAY32 => ContainerKind::Array,
            MP_MAP16 | MP_MAP32 => ContainerKind::Map,
            _ if Self::is_str_family(bd) => ContainerKind::Str,
            _ if (MP_FIX_ARRAY..=0x9f).contains(&bd) => ContainerKind::Array,
            _ if (MP_FIX_MAP..=0x8f).contains(&bd) => ContainerKind::Map,
            _ => ContainerKind::Other,
        })
    }

    fn read_array_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(Len::Nil);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            _ if (MP_FIX_ARRAY..=0x9f).contains(&bd) => Ok(Len::Known((bd & 0x0f) as usize)),
            MP_ARRAY16 => Ok(Len::Known(u16::from_be_bytes(self.rd.readn2()?) as usize)),
            MP_ARRAY32 => Ok(Len::Known(u32::from_be_bytes(self.rd.readn4()?) as usize)),
            _ => Err(self.malformed(bd)),
        }
    }

    fn read_map_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(Len::Nil);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            _ if (MP_FIX_MAP..=0x8f).contains(&bd) => Ok(Len::Known((bd & 0x0f) as usize)),
            MP_MAP16 => Ok(Len::Known(u16::from_be_bytes(self.rd.readn2()?) as usize)),
            MP_MAP32 => Ok(Len::Known(u32::from_be_bytes(self.rd.readn4()?) as usize)),
            _ => Err(self.malformed(bd)),
        }
    }

    fn check_break(&mut self) -> Result<bool, CodecError> {
        Ok(false)
    }

    fn decode_bool(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            MP_FALSE => Ok(false),
            MP_TRUE => Ok(true),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_i64(&mut self) -> Result<i64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        self.read_int_with_bd(bd)
    }

    fn decode_u64(&mut self) -> Result<u64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            MP_UINT64 => Ok(u64::from_be_bytes(self.rd.readn8()?)),
            MP_F32 => num::f64_to_u64(
                f32::from_be_bytes(self.rd.readn4()?) as f64,
                self.rd.numread(),
            ),
            MP_F64 => num::f64_to_u64(f64::from_be_bytes(self.rd.readn8()?), self.rd.numread()),
            _ => {
                let i = self.read_int_with_bd(bd)?;
                num::i64_to_u64(i, self.rd.numread())
            }
        }
    }

    fn decode_f64(&mut self) -> Result<f64, CodecError> {
        if self.try_nil()? {
            return Ok(0.0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            MP_F32 => Ok(f32::from_be_bytes(self.rd.readn4()?) as f64),
            MP_F64 => Ok(f64::from_be_bytes(self.rd.readn8()?)),
            MP_UINT64 => Ok(u64::from_be_bytes(self.rd.readn8()?) as f64),
            _ => Ok(self.read_int_with_bd(bd)? as f64),
        }
    }

    fn decode_f32(&mut self) -> Result<f32, CodecError> {
        let f = self.decode_f64()?;
        if f.is_finite() && (f as f32).is_infinite() {
            return Err(self.overflow("float"));
        }
        Ok(f as f32)
    }

    fn decode_str_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        let n = match self.str_len(bd)?.or(self.bin_len(bd)?) {
            Some(n) => n,
            None => return Err(self.malformed(bd)),
        };
        Ok(self.rd.readx(n)?.to_vec())
    }

    fn decode_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let bd = self.read_bd()?;
        if self.h.bytes_from_array && self.container_kind()? == ContainerKind::Array {
            let n = match self.read_array_start()? {
                Len::Known(n) => n,
                _ => 0,
            };
            let mut out = Vec::with_capacity(crate::codec::init_cap(
                n,
                1,
                self.h.basic.max_init_len,
            ));
            for _ in 0..n {
                let v = self.decode_u64()?;
                let b = u8::try_from(v).map_err(|_| self.overflow("byte"))?;
                out.push(b);
            }
            return Ok(out);
        }
        self.bd_read = false;
        let n = match self.bin_len(bd)?.or(self.str_len(bd)?) {
            Some(n) => n,
            None => return Err(self.malformed(bd)),
        };
        Ok(self.rd.readx(n)?.to_vec())
    }

    fn decode_time(&mut self) -> Result<OffsetDateTime, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        if let Some(n) = self.str_len(bd)? {
            // legacy encoding carries the payload in a raw container
            let data = self.rd.readx(n)?.to_vec();
            return self.time_from_payload(&data);
        }
        let (tag, n) = self.read_ext_hdr(bd)?;
        if tag != MP_TIME_EXT_TAG {
            return Err(CodecError::WrongExtTag {
                expected: MP_TIME_EXT_TAG as u64,
                actual: tag as u64,
            });
        }
        let data = self.rd.readx(n)?.to_vec();
        self.time_from_payload(&data)
    }

    fn decode_ext(&mut self, tag: u64) -> Result<Vec<u8>, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        let (actual, n) = self.read_ext_hdr(bd)?;
        if actual as u64 != tag {
            return Err(CodecError::WrongExtTag {
                expected: tag,
                actual: actual as u64,
            });
        }
        Ok(self.rd.readx(n)?.to_vec())
    }

    fn decode_raw_ext(&mut self) -> Result<RawExt, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        let (tag, n) = self.read_ext_hdr(bd)?;
        let data = self.rd.readx(n)?.to_vec();
        Ok(RawExt::new(tag as u64, data))
    }

    fn decode_naked(&mut self) -> Result<Naked, CodecError> {
        let bd = self.read_bd()?;
        match bd {
            MP_NIL => {
                self.bd_read = false;
                Ok(Naked::Nil)
            }
            MP_FALSE => {
                self.bd_read = false;
                Ok(Naked::Bool(false))
            }
            MP_TRUE => {
                self.bd_read = false;
                Ok(Naked::Bool(true))
            }
            MP_F32 => {
                self.bd_read = false;
                Ok(Naked::Float(f32::from_be_bytes(self.rd.readn4()?) as f64))
            }
            MP_F64 => {
                self.bd_read = false;
                Ok(Naked::Float(f64::from_be_bytes(self.rd.readn8()?)))
            }
            MP_UINT8 | MP_UINT16 | MP_UINT32 | MP_UINT64 => {
                self.bd_read = false;
                let u = match bd {
                    MP_UINT8 => self.rd.readn1()? as u64,
                    MP_UINT16 => u16::from_be_bytes(self.rd.readn2()?) as u64,
                    MP_UINT32 => u32::from_be_bytes(self.rd.readn4()?) as u64,
                    _ => u64::from_be_bytes(self.rd.readn8()?),
                };
                if self.h.basic.signed_integer {
                    Ok(Naked::Int(num::u64_to_i64(u, self.rd.numread())?))
                } else {
                    Ok(Naked::Uint(u))
                }
            }
            // positive fixnum rides with the signed forms: it maps to Int
            // unless positive_int_unsigned asks for Uint
            0x00..=MP_POS_FIX_MAX | MP_NEG_FIX_MIN..=0xff | MP_INT8 | MP_INT16 | MP_INT32
            | MP_INT64 => {
                self.bd_read = false;
                let i = self.read_int_with_bd(bd)?;
                if self.h.positive_int_unsigned && i >= 0 && !self.h.basic.signed_integer {
                    Ok(Naked::Uint(i as u64))
                } else {
                    Ok(Naked::Int(i))
                }
            }
            _ if Self::is_str_family(bd) => {
                self.bd_read = false;
                let n = match self.str_len(bd)? {
                    Some(n) => n,
                    None => return Err(self.malformed(bd)),
                };
                let offset = self.rd.numread();
                let raw = self.rd.readx(n)?.to_vec();
                if self.h.write_ext || self.h.raw_to_string {
                    let s = String::from_utf8(raw)
                        .map_err(|_| CodecError::InvalidUtf8 { offset })?;
                    Ok(Naked::Str(s))
                } else {
                    Ok(Naked::Bytes(raw))
                }
            }
            MP_BIN8 | MP_BIN16 | MP_BIN32 => {
                self.bd_read = false;
                let n = match self.bin_len(bd)? {
                    Some(n) => n,
                    None => return Err(self.malformed(bd)),
                };
                Ok(Naked::Bytes(self.rd.readx(n)?.to_vec()))
            }
            _ if (MP_FIX_ARRAY..=0x9f).contains(&bd) || bd == MP_ARRAY16 || bd == MP_ARRAY32 => {
                Ok(Naked::Array)
            }
            _ if (MP_FIX_MAP..=0x8f).contains(&bd) || bd == MP_MAP16 || bd == MP_MAP32 => {
                Ok(Naked::Map)
            }
            MP_UNUSED => Err(self.malformed(bd)),
            _ => {
                self.bd_read = false;
                let (tag, n) = self.read_ext_hdr(bd)?;
                let data = self.rd.readx(n)?.to_vec();
                if tag == MP_TIME_EXT_TAG {
                    return self.time_from_payload(&data).map(Naked::Time);
                }
                Ok(Naked::Ext {
                    tag: tag as u64,
                    data,
                })
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
        let mut d = MsgpackDecoder::new(self.h, SliceReader::new(data));
        read_value(&mut d)
    }
}
