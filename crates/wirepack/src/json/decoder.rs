//! JSON decode driver.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use data_encoding::{BASE32, BASE32HEX};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use wirepack_buffers::{BufferError, SliceReader, WireRead};

use crate::codec::{read_value, Decoder};
use crate::error::CodecError;
use crate::ext::RawExt;
use crate::handle::{BasicHandle, JsonBytesFormat, JsonHandle, JsonTimeFormat};
use crate::num::{self, Num};
use crate::value::{ContainerKind, Len, Naked, Value};

pub struct JsonDecoder<'h, R> {
    h: &'h JsonHandle,
    rd: R,
    tok: u8,
    tok_read: bool,
    depth: u16,
    /// Closing delimiters of the containers currently open.
    closers: Vec<u8>,
    scratch: Vec<u8>,
}

impl<'h, R: WireRead> JsonDecoder<'h, R> {
    pub(crate) fn new(h: &'h JsonHandle, rd: R) -> Self {
        Self {
            h,
            rd,
            tok: 0,
            tok_read: false,
            depth: 0,
            closers: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Next non-whitespace byte, held until consumed.
    fn read_tok(&mut self) -> Result<u8, CodecError> {
        if !self.tok_read {
            loop {
                let b = self.rd.readn1()?;
                if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                    self.tok = b;
                    self.tok_read = true;
                    break;
                }
            }
        }
        Ok(self.tok)
    }

    fn malformed(&self, bd: u8) -> CodecError {
        CodecError::Malformed {
            bd,
            offset: self.rd.numread(),
        }
    }

    fn expect_rest(&mut self, rest: &[u8]) -> Result<(), CodecError> {
        let offset = self.rd.numread();
        let got = self.rd.readx(rest.len())?;
        if got != rest {
            let bd = got[0];
            return Err(CodecError::Malformed { bd, offset });
        }
        Ok(())
    }

    /// Gathers a bare numeric token into `scratch`, starting from the
    /// pending token byte.
    fn read_number_token(&mut self) -> Result<(), CodecError> {
        let tok = self.read_tok()?;
        self.tok_read = false;
        self.scratch.clear();
        self.scratch.push(tok);
        loop {
            match self.rd.peek() {
                Ok(b) if matches!(b, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-') => {
                    self.scratch.push(b);
                    self.rd.skip(1)?;
                }
                Ok(_) => break,
                // end of input terminates a top-level number
                Err(BufferError::EndOfInput(_)) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u32, CodecError> {
        let offset = self.rd.numread();
        let raw = self.rd.readx(4)?;
        let mut v = 0u32;
        for &c in raw {
            let d = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => return Err(CodecError::Malformed { bd: c, offset }),
            };
            v = (v << 4) | d as u32;
        }
        Ok(v)
    }

    /// Reads the body of a quoted string (opening quote already consumed),
    /// resolving escapes. Returns UTF-8 bytes.
    fn read_string_body(&mut self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        loop {
            let b = self.rd.readn1()?;
            match b {
                b'"' => return Ok(out),
                b'\\' => {
                    let e = self.rd.readn1()?;
                    match e {
                        b'"' | b'\\' | b'/' => out.push(e),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let u = self.read_hex4()?;
                            let c = self.resolve_unicode_escape(u)?;
                            let mut enc = [0u8; 4];
                            out.extend_from_slice(c.encode_utf8(&mut enc).as_bytes());
                        }
                        _ => return Err(self.malformed(e)),
                    }
                }
                _ => out.push(b),
            }
        }
    }

    /// Combines surrogate pairs; anything unpaired becomes U+FFFD.
    fn resolve_unicode_escape(&mut self, u: u32) -> Result<char, CodecError> {
        if (0xd800..0xdc00).contains(&u) {
            // high surrogate: a \uXXXX low surrogate must follow
            if matches!(self.rd.peek(), Ok(b'\\')) {
                self.rd.skip(1)?;
                let e = self.rd.readn1()?;
                if e != b'u' {
                    return Err(self.malformed(e));
                }
                let lo = self.read_hex4()?;
                if (0xdc00..0xe000).contains(&lo) {
                    let c = 0x10000 + ((u - 0xd800) << 10) + (lo - 0xdc00);
                    return Ok(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                return Ok(char::REPLACEMENT_CHARACTER);
            }
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        Ok(char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Gathers a bare (unquoted) token: the text of a number, `true`,
    /// `false` or `null`.
    fn read_bare_token(&mut self) -> Result<(), CodecError> {
        let tok = self.read_tok()?;
        self.tok_read = false;
        self.scratch.clear();
        self.scratch.push(tok);
        loop {
            match self.rd.peek() {
                Ok(b) if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'+' | b'-') => {
                    self.scratch.push(b);
                    self.rd.skip(1)?;
                }
                Ok(_) => break,
                Err(BufferError::EndOfInput(_)) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn parse_scratch_num(&self, prefer_float: bool) -> Result<Num, CodecError> {
        num::parse_number(&self.scratch, prefer_float, self.h.basic.signed_integer).ok_or(
            CodecError::Malformed {
                bd: self.scratch[0],
                offset: self.rd.numread(),
            },
        )
    }

    fn number_as_f64(&mut self) -> Result<f64, CodecError> {
        let tok = self.read_tok()?;
        if tok == b'"' {
            self.tok_read = false;
            let raw = self.read_string_body()?;
            self.scratch = raw;
        } else {
            self.read_number_token()?;
        }
        match self.parse_scratch_num(true)? {
            Num::Float(f) => Ok(f),
            Num::Uint(u) => Ok(u as f64),
            Num::Int(i) => Ok(i as f64),
        }
    }
}

/// Fallback order for byte-string text that the configured encoding
/// rejects.
const BYTES_FORMAT_ORDER: [JsonBytesFormat; 5] = [
    JsonBytesFormat::Base64,
    JsonBytesFormat::Base64Url,
    JsonBytesFormat::Base32,
    JsonBytesFormat::Base32Hex,
    JsonBytesFormat::Base16,
];

fn bytes_from_text(fmt: JsonBytesFormat, raw: &[u8]) -> Option<Vec<u8>> {
    match fmt {
        JsonBytesFormat::Base64 => STANDARD.decode(raw).ok(),
        JsonBytesFormat::Base64Url => URL_SAFE.decode(raw).ok(),
        JsonBytesFormat::Base32 => BASE32.decode(raw).ok(),
        JsonBytesFormat::Base32Hex => BASE32HEX.decode(raw).ok(),
        JsonBytesFormat::Base16 => hex::decode(raw).ok(),
    }
}

impl<'h, R: WireRead> Decoder for JsonDecoder<'h, R> {
    fn basic(&self) -> &BasicHandle {
        &self.h.basic
    }

    fn try_nil(&mut self) -> Result<bool, CodecError> {
        if self.read_tok()? == b'n' {
            self.tok_read = false;
            self.expect_rest(b"ull")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn container_kind(&mut self) -> Result<ContainerKind, CodecError> {
        Ok(match self.read_tok()? {
            b'n' => ContainerKind::Nil,
            b'"' => ContainerKind::Str,
            b'[' => ContainerKind::Array,
            b'{' => ContainerKind::Map,
            _ => ContainerKind::Other,
        })
    }

    fn read_array_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(Len::Nil);
        }
        let tok = self.read_tok()?;
        if tok != b'[' {
            return Err(self.malformed(tok));
        }
        self.tok_read = false;
        self.closers.push(b']');
        Ok(Len::Indefinite)
    }

    fn read_array_elem(&mut self, first: bool) -> Result<(), CodecError> {
        if !first {
            let tok = self.read_tok()?;
            if tok != b',' {
                return Err(self.malformed(tok));
            }
            self.tok_read = false;
        }
        Ok(())
    }

    fn read_map_start(&mut self) -> Result<Len, CodecError> {
        if self.try_nil()? {
            return Ok(Len::Nil);
        }
        let tok = self.read_tok()?;
        if tok != b'{' {
            return Err(self.malformed(tok));
        }
        self.tok_read = false;
        self.closers.push(b'}');
        Ok(Len::Indefinite)
    }

    fn read_map_elem_key(&mut self, first: bool) -> Result<(), CodecError> {
        if !first {
            let tok = self.read_tok()?;
            if tok != b',' {
                return Err(self.malformed(tok));
            }
            self.tok_read = false;
        }
        Ok(())
    }

    fn read_map_elem_value(&mut self) -> Result<(), CodecError> {
        let tok = self.read_tok()?;
        if tok != b':' {
            return Err(self.malformed(tok));
        }
        self.tok_read = false;
        Ok(())
    }

    fn check_break(&mut self) -> Result<bool, CodecError> {
        let closer = match self.closers.last() {
            Some(&c) => c,
            None => return Ok(false),
        };
        if self.read_tok()? == closer {
            self.tok_read = false;
            self.closers.pop();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn decode_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_tok()? {
            b't' => {
                self.tok_read = false;
                self.expect_rest(b"rue")?;
                Ok(true)
            }
            b'f' => {
                self.tok_read = false;
                self.expect_rest(b"alse")?;
                Ok(false)
            }
            tok => Err(self.malformed(tok)),
        }
    }

    fn decode_i64(&mut self) -> Result<i64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let tok = self.read_tok()?;
        if tok == b'"' {
            self.tok_read = false;
            self.scratch = self.read_string_body()?;
        } else {
            self.read_number_token()?;
        }
        match self.parse_scratch_num(false)? {
            Num::Int(i) => Ok(i),
            Num::Uint(u) => num::u64_to_i64(u, self.rd.numread()),
            Num::Float(f) => num::f64_to_i64(f, self.rd.numread()),
        }
    }

    fn decode_u64(&mut self) -> Result<u64, CodecError> {
        if self.try_nil()? {
            return Ok(0);
        }
        let tok = self.read_tok()?;
        if tok == b'"' {
            self.tok_read = false;
            self.scratch = self.read_string_body()?;
        } else {
            self.read_number_token()?;
        }
        match self.parse_scratch_num(false)? {
            Num::Uint(u) => Ok(u),
            Num::Int(i) => num::i64_to_u64(i, self.rd.numread()),
            Num::Float(f) => num::f64_to_u64(f, self.rd.numread()),
        }
    }

    fn decode_f64(&mut self) -> Result<f64, CodecError> {
        if self.try_nil()? {
            return Ok(0.0);
        }
        self.number_as_f64()
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
        let tok = self.read_tok()?;
        if tok == b'"' {
            self.tok_read = false;
            self.read_string_body()
        } else {
            // bare tokens read back as their literal text
            self.read_bare_token()?;
            Ok(std::mem::take(&mut self.scratch))
        }
    }

    fn decode_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.try_nil()? {
            return Ok(Vec::new());
        }
        let tok = self.read_tok()?;
        if tok == b'[' {
            self.read_array_start()?;
            let mut out = Vec::new();
            while !self.check_break()? {
                self.read_array_elem(out.is_empty())?;
                let v = self.decode_u64()?;
                let b = u8::try_from(v).map_err(|_| CodecError::Overflow {
                    what: "byte",
                    offset: self.rd.numread(),
                })?;
                out.push(b);
            }
            return Ok(out);
        }
        if tok != b'"' {
            return Err(self.malformed(tok));
        }
        self.tok_read = false;
        let offset = self.rd.numread();
        let raw = self.read_string_body()?;
        // the configured encoding first, then the rest until one accepts
        if let Some(v) = bytes_from_text(self.h.bytes_format, &raw) {
            return Ok(v);
        }
        for fmt in BYTES_FORMAT_ORDER {
            if fmt != self.h.bytes_format {
                if let Some(v) = bytes_from_text(fmt, &raw) {
                    return Ok(v);
                }
            }
        }
        Err(CodecError::Malformed { bd: b'"', offset })
    }

    fn decode_time(&mut self) -> Result<OffsetDateTime, CodecError> {
        let tok = self.read_tok()?;
        if tok == b'"' {
            self.tok_read = false;
            let raw = self.read_string_body()?;
            let s = String::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8 {
                offset: self.rd.numread(),
            })?;
            return OffsetDateTime::parse(&s, &Rfc3339)
                .map_err(|e| CodecError::Time(e.to_string()));
        }
        let f = self.number_as_f64()?;
        let nanos = match self.h.time_format {
            JsonTimeFormat::Rfc3339 | JsonTimeFormat::UnixSeconds => f * 1e9,
            JsonTimeFormat::UnixMillis => f * 1e6,
            JsonTimeFormat::UnixMicros => f * 1e3,
            JsonTimeFormat::UnixNanos => f,
        };
        if !nanos.is_finite() {
            return Err(CodecError::Time("non-finite timestamp".into()));
        }
        OffsetDateTime::from_unix_timestamp_nanos(nanos.round() as i128)
            .map_err(|e| CodecError::Time(e.to_string()))
    }

    fn decode_ext(&mut self, _tag: u64) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Unsupported("json has no extension wire form"))
    }

    fn decode_raw_ext(&mut self) -> Result<RawExt, CodecError> {
        Err(CodecError::Unsupported("json has no extension wire form"))
    }

    fn decode_naked(&mut self) -> Result<Naked, CodecError> {
        match self.read_tok()? {
            b'n' => {
                self.tok_read = false;
                self.expect_rest(b"ull")?;
                Ok(Naked::Nil)
            }
            b't' => {
                self.tok_read = false;
                self.expect_rest(b"rue")?;
                Ok(Naked::Bool(true))
            }
            b'f' => {
                self.tok_read = false;
                self.expect_rest(b"alse")?;
                Ok(Naked::Bool(false))
            }
            b'"' => {
                self.tok_read = false;
                let offset = self.rd.numread();
                let raw = self.read_string_body()?;
                let s = String::from_utf8(raw)
                    .map_err(|_| CodecError::InvalidUtf8 { offset })?;
                Ok(Naked::Str(s))
            }
            b'[' => Ok(Naked::Array),
            b'{' => Ok(Naked::Map),
            tok if matches!(tok, b'-' | b'0'..=b'9') => {
                self.read_number_token()?;
                match self.parse_scratch_num(self.h.prefer_float)? {
                    Num::Uint(u) => Ok(Naked::Uint(u)),
                    Num::Int(i) => Ok(Naked::Int(i)),
                    Num::Float(f) => Ok(Naked::Float(f)),
                }
            }
            tok => Err(self.malformed(tok)),
        }
    }

    fn num_bytes_read(&self) -> usize {
        self.rd.numread()
    }

    fn descriptor_pending(&self) -> bool {
        self.tok_read
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

    fn value_from_slice(&self, data: &[u8]) -> Result<Value, CodecError> {
        let mut d = JsonDecoder::new(self.h, SliceReader::new(data));
        read_value(&mut d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn decode(s: &str) -> Value {
        JsonHandle::new().decode_value(s.as_bytes()).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(decode("null"), Value::Nil);
        assert_eq!(decode("true"), Value::Bool(true));
        assert_eq!(decode(" false "), Value::Bool(false));
        assert_eq!(decode("100"), Value::Uint(100));
        assert_eq!(decode("-42"), Value::Int(-42));
        assert_eq!(decode("1.5"), Value::Float(1.5));
        assert_eq!(decode("\"hi\""), Value::Str("hi".into()));
    }

    #[test]
    fn exponents_fold_to_integers_without_prefer_float() {
        assert_eq!(decode("1e2"), Value::Uint(100));
        let mut h = JsonHandle::new();
        h.prefer_float = true;
        assert_eq!(h.decode_value(b"1e2").unwrap(), Value::Float(100.0));
    }

    #[test]
    fn leading_zeros_are_malformed() {
        let err = JsonHandle::new().decode_value(b"01").unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn containers() {
        assert_eq!(
            decode(r#"{"a":1}"#),
            Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
        );
        assert_eq!(
            decode("[1, 2,\n3]"),
            Value::Array(vec![Value::Uint(1), Value::Uint(2), Value::Uint(3)])
        );
        assert_eq!(decode("[]"), Value::Array(vec![]));
        assert_eq!(decode("{}"), Value::Map(vec![]));
        assert_eq!(
            decode(r#"{"a": [true, null], "b": {"c": -1}}"#),
            Value::Map(vec![
                (
                    Value::Str("a".into()),
                    Value::Array(vec![Value::Bool(true), Value::Nil])
                ),
                (
                    Value::Str("b".into()),
                    Value::Map(vec![(Value::Str("c".into()), Value::Int(-1))])
                ),
            ])
        );
    }

    #[test]
    fn trailing_comma_is_malformed() {
        assert!(JsonHandle::new().decode_value(b"[1,]").is_err());
    }

    #[test]
    fn escapes_and_surrogate_pairs() {
        assert_eq!(
            decode(r#""a\"b\\c\ndA""#),
            Value::Str("a\"b\\c\ndA".into())
        );
        // U+1D11E (musical G clef)
        assert_eq!(decode(r#""𝄞""#), Value::Str("\u{1d11e}".into()));
        assert_eq!(
            decode(r#""\uD834x""#),
            Value::Str("\u{fffd}x".into())
        );
        assert_eq!(decode(r#""\uDD1E""#), Value::Str("\u{fffd}".into()));
    }

    #[test]
    fn bytes_decode_tries_each_encoding() {
        let h = JsonHandle::new();
        let mut d = h.decoder(b"\"AQID\"");
        assert_eq!(d.decode_bytes().unwrap(), vec![1, 2, 3]);
        let mut d = h.decoder(b"\"010203\"");
        assert_eq!(d.decode_bytes().unwrap(), vec![1, 2, 3]);
        let mut d = h.decoder(b"[1,2,300]");
        assert!(matches!(
            d.decode_bytes(),
            Err(CodecError::Overflow { .. })
        ));
        let mut d = h.decoder(b"[1,2,3]");
        assert_eq!(d.decode_bytes().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn time_decode_modes() {
        let t = datetime!(2000-01-01 00:00:00 UTC);
        let h = JsonHandle::new();
        let mut d = h.decoder(b"\"2000-01-01T00:00:00Z\"");
        assert_eq!(d.decode_time().unwrap(), t);
        let mut h2 = JsonHandle::new();
        h2.time_format = JsonTimeFormat::UnixMillis;
        let mut d = h2.decoder(b"946684800000");
        assert_eq!(d.decode_time().unwrap(), t);
    }

    #[test]
    fn quoted_numbers_accepted_for_typed_reads() {
        let h = JsonHandle::new();
        let mut d = h.decoder(b"\"100\"");
        assert_eq!(d.decode_u64().unwrap(), 100);
    }

    #[test]
    fn float_with_fraction_does_not_narrow() {
        let h = JsonHandle::new();
        let mut d = h.decoder(b"1.5");
        assert!(matches!(d.decode_i64(), Err(CodecError::Overflow { .. })));
    }

    #[test]
    fn depth_limit_enforced() {
        let mut h = JsonHandle::new();
        h.basic.max_depth = 4;
        let deep = "[".repeat(6) + &"]".repeat(6);
        assert!(matches!(
            h.decode_value(deep.as_bytes()),
            Err(CodecError::DepthExceeded)
        ));
    }
}
