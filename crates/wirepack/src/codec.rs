//! The encode/decode driver traits shared by all five formats, and the
//! generic walkers that drive a whole [`Value`] tree through them.

use time::OffsetDateTime;
use wirepack_buffers::Writer;

use crate::error::CodecError;
use crate::ext::{ExtKind, RawExt};
use crate::handle::BasicHandle;
use crate::value::{ContainerKind, Len, Naked, Value};

/// Format encode driver. Scalar writes are infallible (the writer grows);
/// only time and extension encodes can reject a value.
pub trait Encoder {
    fn writer(&mut self) -> &mut Writer;
    fn basic(&self) -> &BasicHandle;

    fn encode_nil(&mut self);
    fn encode_bool(&mut self, v: bool);
    fn encode_int(&mut self, v: i64);
    fn encode_uint(&mut self, v: u64);
    fn encode_f32(&mut self, v: f32);
    fn encode_f64(&mut self, v: f64);
    fn encode_str(&mut self, s: &str);
    /// Writes raw bytes under the format's string container. Formats with
    /// strict string encodings substitute replacement characters.
    fn encode_str_bytes_raw(&mut self, data: &[u8]);
    fn encode_bytes(&mut self, data: &[u8]);
    fn encode_time(&mut self, t: &OffsetDateTime) -> Result<(), CodecError>;
    /// Writes a tagged payload produced by an extension converter.
    fn encode_ext(&mut self, tag: u64, payload: &[u8]) -> Result<(), CodecError>;
    /// Re-emits a raw extension as previously captured by a decoder.
    fn encode_raw_ext(&mut self, re: &RawExt) -> Result<(), CodecError>;

    fn write_array_start(&mut self, len: usize);
    fn write_array_elem(&mut self, _first: bool) {}
    fn write_array_end(&mut self) {}
    fn write_array_empty(&mut self) {
        self.write_array_start(0);
        self.write_array_end();
    }
    fn write_map_start(&mut self, len: usize);
    fn write_map_elem_key(&mut self, _first: bool) {}
    fn write_map_elem_value(&mut self) {}
    fn write_map_end(&mut self) {}
    fn write_map_empty(&mut self) {
        self.write_map_start(0);
        self.write_map_end();
    }
    /// Marks whether the next scalar is a map key. JSON renders non-string
    /// keys as quoted strings; binary formats ignore the hint.
    fn map_key_hint(&mut self, _on: bool) {}
    /// Trailing output after a complete top-level value.
    fn end(&mut self) {}

    /// Creates a side encoder of the same format and configuration, backed
    /// by a writer from the handle's pool.
    fn fork(&self) -> Self
    where
        Self: Sized;
    /// Takes a side encoder's output and returns its writer to the pool.
    fn join(self) -> Vec<u8>
    where
        Self: Sized;
}

/// Format decode driver over some byte source.
///
/// Drivers hold the peeked descriptor byte between calls, so introspection
/// (`container_kind`, naked container markers) composes with the typed
/// reads that follow.
pub trait Decoder {
    fn basic(&self) -> &BasicHandle;

    /// Consumes a nil if one is next; reports whether it did.
    fn try_nil(&mut self) -> Result<bool, CodecError>;
    /// Classifies the next value without consuming it.
    fn container_kind(&mut self) -> Result<ContainerKind, CodecError>;

    fn read_array_start(&mut self) -> Result<Len, CodecError>;
    fn read_array_elem(&mut self, _first: bool) -> Result<(), CodecError> {
        Ok(())
    }
    fn read_array_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }
    fn read_map_start(&mut self) -> Result<Len, CodecError>;
    fn read_map_elem_key(&mut self, _first: bool) -> Result<(), CodecError> {
        Ok(())
    }
    fn read_map_elem_value(&mut self) -> Result<(), CodecError> {
        Ok(())
    }
    fn read_map_end(&mut self) -> Result<(), CodecError> {
        Ok(())
    }
    /// In an indefinite container, consumes the terminator when it is next
    /// and reports whether it did.
    fn check_break(&mut self) -> Result<bool, CodecError>;

    fn decode_bool(&mut self) -> Result<bool, CodecError>;
    fn decode_i64(&mut self) -> Result<i64, CodecError>;
    fn decode_u64(&mut self) -> Result<u64, CodecError>;
    fn decode_f64(&mut self) -> Result<f64, CodecError>;
    fn decode_f32(&mut self) -> Result<f32, CodecError>;
    /// Reads a string container as raw bytes.
    fn decode_str_bytes(&mut self) -> Result<Vec<u8>, CodecError>;
    fn decode_str(&mut self) -> Result<String, CodecError>
    where
        Self: Sized,
    {
        let offset = self.num_bytes_read();
        String::from_utf8(self.decode_str_bytes()?)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }
    fn decode_bytes(&mut self) -> Result<Vec<u8>, CodecError>;
    fn decode_time(&mut self) -> Result<OffsetDateTime, CodecError>;
    /// Reads an extension payload, failing unless its tag equals `tag`.
    fn decode_ext(&mut self, tag: u64) -> Result<Vec<u8>, CodecError>;
    fn decode_raw_ext(&mut self) -> Result<RawExt, CodecError>;

    /// Reads one value into the faux union. Containers come back as
    /// markers with the descriptor retained.
    fn decode_naked(&mut self) -> Result<Naked, CodecError>;

    fn num_bytes_read(&self) -> usize;
    /// True when a descriptor byte has been peeked but its value not yet
    /// consumed (i.e. the reader is mid-value).
    fn descriptor_pending(&self) -> bool;
    fn start_recording(&mut self);
    fn stop_recording(&mut self) -> Vec<u8>;
    fn depth_incr(&mut self) -> Result<(), CodecError>;
    fn depth_decr(&mut self);

    /// Returns the raw encoded bytes of the next complete value, leaving
    /// the reader positioned just past it.
    fn next_value_bytes(&mut self) -> Result<Vec<u8>, CodecError>
    where
        Self: Sized,
    {
        if self.descriptor_pending() {
            return Err(CodecError::Internal(
                "next_value_bytes requires a value boundary",
            ));
        }
        self.start_recording();
        let walked = read_value(self);
        let bytes = self.stop_recording();
        walked?;
        Ok(bytes)
    }

    /// Decodes a complete value from detached bytes in this same format
    /// and configuration (self-describing extension payloads).
    fn value_from_slice(&self, data: &[u8]) -> Result<Value, CodecError>;
}

/// Caps an announced element count to what `max_init_len` bytes of
/// `unit`-sized elements would allow, so hostile headers cannot force a
/// huge allocation up front.
pub(crate) fn init_cap(announced: usize, unit: usize, max_init_len: usize) -> usize {
    announced.min((max_init_len / unit.max(1)).max(1))
}

/// Encodes one value tree through any driver.
pub fn write_value<E: Encoder>(enc: &mut E, v: &Value) -> Result<(), CodecError> {
    match v {
        Value::Nil => enc.encode_nil(),
        Value::Bool(b) => enc.encode_bool(*b),
        Value::Int(i) => enc.encode_int(*i),
        Value::Uint(u) => enc.encode_uint(*u),
        Value::Float(f) => enc.encode_f64(*f),
        Value::Str(s) => enc.encode_str(s),
        Value::Bytes(b) => enc.encode_bytes(b),
        Value::Time(t) => enc.encode_time(t)?,
        Value::Array(items) => {
            if items.is_empty() {
                enc.write_array_empty();
            } else {
                enc.write_array_start(items.len());
                for (i, item) in items.iter().enumerate() {
                    enc.write_array_elem(i == 0);
                    write_value(enc, item)?;
                }
                enc.write_array_end();
            }
        }
        Value::Map(pairs) => write_map(enc, pairs)?,
        Value::Ext(re) => write_ext(enc, re)?,
    }
    Ok(())
}

fn write_map<E: Encoder>(enc: &mut E, pairs: &[(Value, Value)]) -> Result<(), CodecError> {
    if pairs.is_empty() {
        enc.write_map_empty();
        return Ok(());
    }
    if enc.basic().canonical && pairs.len() > 1 {
        let mut sub = enc.fork();
        let encoded = encode_pairs_detached(&mut sub, pairs);
        sub.join();
        let mut encoded = encoded?;
        encoded.sort_by(|a, b| a.0.cmp(&b.0));
        enc.write_map_start(pairs.len());
        for (i, (kb, vb)) in encoded.iter().enumerate() {
            enc.write_map_elem_key(i == 0);
            enc.writer().bytes(kb);
            enc.write_map_elem_value();
            enc.writer().bytes(vb);
        }
        enc.write_map_end();
        return Ok(());
    }
    enc.write_map_start(pairs.len());
    for (i, (k, v)) in pairs.iter().enumerate() {
        enc.write_map_elem_key(i == 0);
        enc.map_key_hint(true);
        write_value(enc, k)?;
        enc.map_key_hint(false);
        enc.write_map_elem_value();
        write_value(enc, v)?;
    }
    enc.write_map_end();
    Ok(())
}

/// Encodes each pair into detached buffers for canonical key ordering.
fn encode_pairs_detached<E: Encoder>(
    sub: &mut E,
    pairs: &[(Value, Value)],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CodecError> {
    let mut out = Vec::with_capacity(pairs.len());
    for (k, v) in pairs {
        sub.map_key_hint(true);
        write_value(sub, k)?;
        sub.map_key_hint(false);
        let kb = sub.writer().take();
        write_value(sub, v)?;
        let vb = sub.writer().take();
        out.push((kb, vb));
    }
    Ok(out)
}

fn write_ext<E: Encoder>(enc: &mut E, re: &RawExt) -> Result<(), CodecError> {
    enum Plan {
        Converter,
        SelfDescribing,
        Raw,
    }
    let plan = match (enc.basic().extensions().lookup(re.tag), &re.value) {
        (Some(entry), Some(_)) => match entry.kind() {
            ExtKind::Converter(_) => Plan::Converter,
            ExtKind::SelfDescribing => Plan::SelfDescribing,
        },
        _ => Plan::Raw,
    };
    match plan {
        Plan::Converter => {
            let value = re
                .value
                .as_deref()
                .ok_or(CodecError::Internal("extension value missing"))?;
            let payload = match enc.basic().extensions().lookup(re.tag).map(|e| e.kind()) {
                Some(ExtKind::Converter(c)) => c.encode(value)?,
                _ => return Err(CodecError::Internal("extension entry vanished")),
            };
            enc.encode_ext(re.tag, &payload)
        }
        Plan::SelfDescribing => {
            let value = re
                .value
                .as_deref()
                .ok_or(CodecError::Internal("extension value missing"))?;
            let mut sub = enc.fork();
            let written = write_value(&mut sub, value);
            let payload = sub.join();
            written?;
            enc.encode_ext(re.tag, &payload)
        }
        Plan::Raw => enc.encode_raw_ext(re),
    }
}

/// Decodes one value tree through any driver.
pub fn read_value<D: Decoder>(d: &mut D) -> Result<Value, CodecError> {
    match d.decode_naked()? {
        Naked::Nil => Ok(Value::Nil),
        Naked::Bool(b) => Ok(Value::Bool(b)),
        Naked::Int(i) => Ok(Value::Int(i)),
        Naked::Uint(u) => Ok(Value::Uint(u)),
        Naked::Float(f) => Ok(Value::Float(f)),
        Naked::Str(s) => Ok(Value::Str(s)),
        Naked::Bytes(b) => Ok(Value::Bytes(b)),
        Naked::Time(t) => Ok(Value::Time(t)),
        Naked::Array => read_array(d),
        Naked::Map => read_map(d),
        Naked::Ext { tag, data } => read_ext_value(d, tag, data),
    }
}

fn read_array<D: Decoder>(d: &mut D) -> Result<Value, CodecError> {
    d.depth_incr()?;
    let out = match d.read_array_start()? {
        Len::Nil => {
            d.depth_decr();
            return Ok(Value::Nil);
        }
        Len::Known(n) => {
            let mut out = Vec::with_capacity(init_cap(n, 16, d.basic().max_init_len));
            for i in 0..n {
                d.read_array_elem(i == 0)?;
                out.push(read_value(d)?);
            }
            d.read_array_end()?;
            out
        }
        Len::Indefinite => {
            let mut out = Vec::new();
            let mut first = true;
            while !d.check_break()? {
                d.read_array_elem(first)?;
                first = false;
                out.push(read_value(d)?);
            }
            out
        }
    };
    d.depth_decr();
    Ok(Value::Array(out))
}

fn read_map<D: Decoder>(d: &mut D) -> Result<Value, CodecError> {
    d.depth_incr()?;
    let out = match d.read_map_start()? {
        Len::Nil => {
            d.depth_decr();
            return Ok(Value::Nil);
        }
        Len::Known(n) => {
            let mut out = Vec::with_capacity(init_cap(n, 32, d.basic().max_init_len));
            for i in 0..n {
                d.read_map_elem_key(i == 0)?;
                let k = read_value(d)?;
                d.read_map_elem_value()?;
                let v = read_value(d)?;
                out.push((k, v));
            }
            d.read_map_end()?;
            out
        }
        Len::Indefinite => {
            let mut out = Vec::new();
            let mut first = true;
            while !d.check_break()? {
                d.read_map_elem_key(first)?;
                first = false;
                let k = read_value(d)?;
                d.read_map_elem_value()?;
                let v = read_value(d)?;
                out.push((k, v));
            }
            out
        }
    };
    d.depth_decr();
    Ok(Value::Map(out))
}

fn read_ext_value<D: Decoder>(d: &mut D, tag: u64, data: Vec<u8>) -> Result<Value, CodecError> {
    match d.basic().extensions().lookup(tag).map(|e| e.kind()) {
        Some(ExtKind::SelfDescribing) => d.value_from_slice(&data),
        Some(ExtKind::Converter(c)) => c.decode(&data),
        None => Ok(Value::Ext(RawExt::new(tag, data))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_cap_clamps_hostile_lengths() {
        assert_eq!(init_cap(10, 16, 1024 * 1024), 10);
        assert_eq!(init_cap(usize::MAX, 16, 1024 * 1024), 65536);
        assert_eq!(init_cap(5, 16, 0), 1);
    }
}
