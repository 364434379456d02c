//! Binc decode driver.

use time::OffsetDateTime;
use wirepack_buffers::{SliceReader, WireRead};

use super::constants::*;
use crate::codec::{read_value, Decoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, BincHandle};
use crate::num;
use crate::value::{ContainerKind, Len, Naked, Value};

pub struct BincDecoder<'h, R> {
    h: &'h BincHandle,
    rd: R,
    bd: u8,
    bd_read: bool,
    depth: u16,
}

impl<'h, R: WireRead> BincDecoder<'h, R> {
    pub(crate) fn new(h: &'h BincHandle, rd: R) -> Self {
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

    /// Magnitude of a pruned integer: `vs + 1` big-endian bytes.
    fn read_magnitude(&mut self, vs: u8) -> Result<u64, CodecError> {
        if vs > 7 {
            return Err(self.malformed((VD_POS_INT << 4) | vs));
        }
        let n = vs as usize + 1;
        let raw = self.rd.readx(n)?;
        let mut v = 0u64;
        for &b in raw {
            v = (v << 8) | b as u64;
        }
        Ok(v)
    }

    fn read_len_vs(&mut self, vs: u8) -> Result<usize, CodecError> {
        Ok(match vs {
            0 => self.rd.readn1()? as usize,
            1 => u16::from_be_bytes(self.rd.readn2()?) as usize,
            2 => u32::from_be_bytes(self.rd.readn4()?) as usize,
            3 => {
                let v = u64::from_be_bytes(self.rd.readn8()?);
                usize::try_from(v).map_err(|_| CodecError::Overflow {
                    what: "length",
                    offset: self.rd.numread(),
                })?
            }
            _ => vs as usize - 4,
        })
    }

    /// Reads a float body for sub-descriptor `vs`, zero-filling pruned
    /// significands.
    fn read_float_vs(&mut self, vs: u8) -> Result<f64, CodecError> {
        let width = match vs & 7 {
            FL_F32 => 4usize,
            FL_F64 => 8,
            _ => return Err(self.malformed((VD_FLOAT << 4) | vs)),
        };
        let mut be = [0u8; 8];
        if vs & FL_PRUNED != 0 {
            let n = self.rd.readn1()? as usize;
            if n > width {
                return Err(self.malformed((VD_FLOAT << 4) | vs));
            }
            let raw = self.rd.readx(n)?;
            be[..n].copy_from_slice(raw);
        } else {
            let raw = self.rd.readx(width)?;
            be[..width].copy_from_slice(raw);
        }
        if vs & 7 == FL_F32 {
            Ok(f32::from_be_bytes([be[0], be[1], be[2], be[3]]) as f64)
        } else {
            Ok(f64::from_be_bytes(be))
        }
    }

    fn special_float(&self, vs: u8) -> Option<f64> {
        match vs {
            SP_NAN => Some(f64::NAN),
            SP_POS_INF => Some(f64::INFINITY),
            SP_NEG_INF => Some(f64::NEG_INFINITY),
            SP_ZERO_FLOAT => Some(0.0),
            _ => None,
        }
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
        let (vd, vs) = (bd >> 4, bd & 0x0f);
        match vd {
            VD_SPECIAL if vs <= SP_NEG_ONE => {}
            VD_SMALL_INT => {}
            VD_POS_INT | VD_NEG_INT => {
                if vs > 7 {
                    return Err(self.malformed(bd));
                }
                self.rd.skip(vs as usize + 1)?;
            }
            VD_FLOAT => {
                if vs & FL_PRUNED != 0 {
                    let n = self.rd.readn1()? as usize;
                    self.rd.skip(n)?;
                } else {
                    match vs & 7 {
                        FL_F32 => self.rd.skip(4)?,
                        FL_F64 => self.rd.skip(8)?,
                        _ => return Err(self.malformed(bd)),
                    }
                }
            }
            VD_STR | VD_BYTES => {
                let n = self.read_len_vs(vs)?;
                self.rd.skip(n)?;
            }
            VD_ARRAY | VD_MAP => {
                let per = if vd == VD_MAP { 2 } else { 1 };
                let n = self.read_len_vs(vs)?;
                for _ in 0..n * per {
                    let nb = self.rd.readn1()?;
                    self.skip_value_with_bd(nb)?;
                }
            }
            VD_TIME => self.rd.skip(vs as usize)?,
            VD_EXT => {
                let n = self.read_len_vs(vs)?;
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

    fn read_ext_body(&mut self, vs: u8) -> Result<(u8, Vec<u8>), CodecError> {
        let n = self.read_len_vs(vs)?;
        let tag = self.rd.readn1()?;
        Ok((tag, self.rd.readx(n)?.to_vec()))
    }
}

impl<'h, R: WireRead> Decoder for BincDecoder<'h, R> {
    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn try_nil(&mut self) -> Result<bool, CodecError> {
        if self.read_bd()? == (VD_SPECIAL << 4) | SP_NIL {
            self.bd_read = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn container_kind(&mut self) -> Result<ContainerKind, CodecError> {
        let bd = self.read_bd()?;
        Ok(match bd >> 4 {
            VD_SPECIAL if bd & 0x0f == SP_NIL => ContainerKind::Nil,
            VD_BYTES => ContainerKind::Bytes,
            VD_STR => ContainerKind::Str,
            VD_ARRAY => ContainerKind::Array,
            VD_MAP => ContainerKind::Map,
            _ => ContainerKind::Other,
        })
    }

    fn read_array_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(Len::Nil);
        }
        let bd = self.read_bd()?;
        if bd >> 4 != VD_ARRAY {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        Ok(Len::Known(self.read_len_vs(bd & 0x0f)?))
    }

    fn read_map_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(Len::Nil);
        }
        let bd = self.read_bd()?;
        if bd >> 4 != VD_MAP {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        Ok(Len::Known(self.read_len_vs(bd & 0x0f)?))
    }

    fn check_break(&mut self) -> Result<bool, CodecError> {
        Ok(false)
    }

    fn decode_bool(&mut self) -> Result<bool, CodecError> {
        let bd = self.read_bd()?;
        self.bd_read = false;
        match bd {
            0x01 => Ok(false),
            0x02 => Ok(true),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_i64(&mut self) -> Result<i64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        let (vd, vs) = (bd >> 4, bd & 0x0f);
        match vd {
            VD_SPECIAL => match vs {
                SP_ZERO => Ok(0),
                SP_NEG_ONE => Ok(-1),
                _ => Err(self.malformed(bd)),
            },
            VD_SMALL_INT => Ok(vs as i64 + 1),
            VD_POS_INT => num::u64_to_i64(self.read_magnitude(vs)?, self.rd.numread()),
            VD_NEG_INT => {
                let mag = self.read_magnitude(vs)?;
                self.neg_from_magnitude(mag)
            }
            VD_FLOAT => num::f64_to_i64(self.read_float_vs(vs)?, self.rd.numread()),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_u64(&mut self) -> Result<u64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        let (vd, vs) = (bd >> 4, bd & 0x0f);
        match vd {
            VD_SPECIAL if vs == SP_ZERO => Ok(0),
            VD_SMALL_INT => Ok(vs as u64 + 1),
            VD_POS_INT => self.read_magnitude(vs),
            VD_NEG_INT => {
                self.read_magnitude(vs)?;
                Err(CodecError::Overflow {
                    what: "negative integer",
                    offset: self.rd.numread(),
                })
            }
            VD_FLOAT => num::f64_to_u64(self.read_float_vs(vs)?, self.rd.numread()),
            _ => Err(self.malformed(bd)),
        }
    }

    fn decode_f64(&mut self) -> Result<f64, CodecError> {
        if self.try_nil()? {
            return Ok(0.0);
        }
        let bd = self.read_bd()?;
        self.bd_read = false;
        let (vd, vs) = (bd >> 4, bd & 0x0f);
        match vd {
            VD_FLOAT => self.read_float_vs(vs),
            VD_SPECIAL => match self.special_float(vs) {
                Some(f) => Ok(f),
                None if vs == SP_ZERO => Ok(0.0),
                None if vs == SP_NEG_ONE => Ok(-1.0),
                None => Err(self.malformed(bd)),
            },
            VD_SMALL_INT => Ok(vs as f64 + 1.0),
            VD_POS_INT => Ok(self.read_magnitude(vs)? as f64),
            VD_NEG_INT => Ok(-(self.read_magnitude(vs)? as f64)),
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
        let vd = bd >> 4;
        if vd != VD_STR && vd != VD_BYTES {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let n = self.read_len_vs(bd & 0x0f)?;
        Ok(self.rd.readx(n)?.to_vec())
    }

    fn decode_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let bd = self.read_bd()?;
        if bd >> 4 == VD_ARRAY {
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
        if bd >> 4 != VD_TIME {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let n = (bd & 0x0f) as usize;
        let data = self.rd.readx(n)?.to_vec();
        self.time_from_payload(&data)
    }

    fn decode_ext(&mut self, tag: u64) -> Result<Vec<u8>, CodecError> {
        let bd = self.read_bd()?;
        if bd >> 4 != VD_EXT {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let (actual, data) = self.read_ext_body(bd & 0x0f)?;
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
        if bd >> 4 != VD_EXT {
            return Err(self.malformed(bd));
        }
        self.bd_read = false;
        let (tag, data) = self.read_ext_body(bd & 0x0f)?;
        Ok(RawExt::new(tag as u64, data))
    }

    fn decode_naked(&mut self) -> Result<Naked, CodecError> {
        let bd = self.read_bd()?;
        let (vd, vs) = (bd >> 4, bd & 0x0f);
        match vd {
            VD_SPECIAL => {
                self.bd_read = false;
                match vs {
                    SP_NIL => Ok(Naked::Nil),
                    SP_FALSE => Ok(Naked::Bool(false)),
                    SP_TRUE => Ok(Naked::Bool(true)),
                    SP_ZERO => {
                        if self.h.basic.signed_integer {
                            Ok(Naked::Int(0))
                        } else {
                            Ok(Naked::Uint(0))
                        }
                    }
                    SP_NEG_ONE => Ok(Naked::Int(-1)),
                    _ => match self.special_float(vs) {
                        Some(f) => Ok(Naked::Float(f)),
                        None => Err(self.malformed(bd)),
                    },
                }
            }
            VD_SMALL_INT => {
                self.bd_read = false;
                if self.h.basic.signed_integer {
                    Ok(Naked::Int(vs as i64 + 1))
                } else {
                    Ok(Naked::Uint(vs as u64 + 1))
                }
            }
            VD_POS_INT => {
                self.bd_read = false;
                let mag = self.read_magnitude(vs)?;
                if self.h.basic.signed_integer {
                    Ok(Naked::Int(num::u64_to_i64(mag, self.rd.numread())?))
                } else {
                    Ok(Naked::Uint(mag))
                }
            }
            VD_NEG_INT => {
                self.bd_read = false;
                let mag = self.read_magnitude(vs)?;
                Ok(Naked::Int(self.neg_from_magnitude(mag)?))
            }
            VD_FLOAT => {
                self.bd_read = false;
                Ok(Naked::Float(self.read_float_vs(vs)?))
            }
            VD_STR => {
                self.bd_read = false;
                let n = self.read_len_vs(vs)?;
                let offset = self.rd.numread();
                let raw = self.rd.readx(n)?.to_vec();
                let s = String::from_utf8(raw)
                    .map_err(|_| CodecError::InvalidUtf8 { offset })?;
                Ok(Naked::Str(s))
            }
            VD_BYTES => {
                self.bd_read = false;
                let n = self.read_len_vs(vs)?;
                Ok(Naked::Bytes(self.rd.readx(n)?.to_vec()))
            }
            VD_ARRAY => Ok(Naked::Array),
            VD_MAP => Ok(Naked::Map),
            VD_TIME => {
                self.bd_read = false;
                let data = self.rd.readx(vs as usize)?.to_vec();
                Ok(Naked::Time(self.time_from_payload(&data)?))
            }
            VD_EXT => {
                self.bd_read = false;
                let (tag, data) = self.read_ext_body(vs)?;
                Ok(Naked::Ext {
                    tag: tag as u64,
                    data,
                })
            }
            VD_SYMBOL => Err(CodecError::Unsupported("binc symbol tables")),
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
        let mut d = BincDecoder::new(self.h, SliceReader::new(data));
        read_value(&mut d)
    }
}
