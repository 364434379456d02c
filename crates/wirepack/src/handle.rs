//! Per-format configuration handles and codec factories.
//!
//! A handle owns the shared knobs, the extension registry and a pool of
//! side writers. Codecs borrow the handle immutably, so once any codec
//! exists the registry cannot change; registration needs `&mut` access
//! before the handle is shared.

use std::io;
use std::sync::Mutex;

use wirepack_buffers::{IoReader, SliceReader, Writer};

use crate::binc::{BincDecoder, BincEncoder};
use crate::cbor::{CborDecoder, CborEncoder};
use crate::codec::{read_value, write_value, Encoder};
use crate::error::CodecError;
use crate::ext::ExtRegistry;
use crate::json::{JsonDecoder, JsonEncoder};
use crate::msgpack::{MsgpackDecoder, MsgpackEncoder};
use crate::simple::{SimpleDecoder, SimpleEncoder};
use crate::value::Value;

/// Configuration shared by every format.
pub struct BasicHandle {
    /// Sort map entries by their encoded key bytes.
    pub canonical: bool,
    /// Validate UTF-8 eagerly where the format allows early checks (for
    /// example per chunk of an indefinite CBOR text string).
    pub validate_utf8: bool,
    /// Prefer `Int` over `Uint` for non-negative decoded integers.
    pub signed_integer: bool,
    /// Byte budget for eager container preallocation during decode.
    pub max_init_len: usize,
    /// Container nesting limit during decode.
    pub max_depth: u16,
    /// Refill buffer size for stream decoders.
    pub reader_buffer_size: usize,
    /// Allocation unit for encoder writers.
    pub writer_buffer_size: usize,
    exts: ExtRegistry,
    side_pool: Mutex<Vec<Writer>>,
}

impl Default for BasicHandle {
    fn default() -> Self {
        Self {
            canonical: false,
            validate_utf8: false,
            signed_integer: false,
            max_init_len: 1024 * 1024,
            max_depth: 1024,
            reader_buffer_size: 4096,
            writer_buffer_size: 64 * 1024,
            exts: ExtRegistry::new(),
            side_pool: Mutex::new(Vec::new()),
        }
    }
}

impl BasicHandle {
    pub fn extensions(&self) -> &ExtRegistry {
        &self.exts
    }

    pub fn extensions_mut(&mut self) -> &mut ExtRegistry {
        &mut self.exts
    }

    pub(crate) fn pool_get(&self) -> Writer {
        self.side_pool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| Writer::with_alloc_size(self.writer_buffer_size))
    }

    pub(crate) fn pool_put(&self, mut w: Writer) {
        w.take();
        self.side_pool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(w);
    }

    pub(crate) fn new_writer(&self) -> Writer {
        Writer::with_alloc_size(self.writer_buffer_size)
    }
}

/// When to render a JSON integer inside quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerAsString {
    #[default]
    Never,
    /// Quote only integers whose magnitude exceeds 2^53, which plain JSON
    /// consumers would otherwise round.
    BeyondSafeRange,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonTimeFormat {
    #[default]
    Rfc3339,
    UnixSeconds,
    UnixMillis,
    UnixMicros,
    UnixNanos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonBytesFormat {
    #[default]
    Base64,
    Base64Url,
    Base32,
    Base32Hex,
    Base16,
}

macro_rules! handle_factories {
    ($handle:ident, $enc:ident, $dec:ident) => {
        impl $handle {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn extensions_mut(&mut self) -> &mut ExtRegistry {
                self.basic.extensions_mut()
            }

            pub fn encoder(&self) -> $enc<'_> {
                $enc::new(self)
            }

            pub fn decoder<'a>(&self, data: &'a [u8]) -> $dec<'_, SliceReader<'a>> {
                $dec::new(self, SliceReader::new(data))
            }

            pub fn decoder_from<R: io::Read>(&self, src: R) -> $dec<'_, IoReader<R>> {
                $dec::new(
                    self,
                    IoReader::with_capacity(src, self.basic.reader_buffer_size),
                )
            }

            pub fn encode_value(&self, v: &Value) -> Result<Vec<u8>, CodecError> {
                let mut enc = self.encoder();
                write_value(&mut enc, v)?;
                enc.end();
                Ok(enc.writer().take())
            }

            pub fn decode_value(&self, data: &[u8]) -> Result<Value, CodecError> {
                let mut dec = self.decoder(data);
                read_value(&mut dec)
            }
        }
    };
}

/// CBOR (RFC 8949) handle.
#[derive(Default)]
pub struct CborHandle {
    pub basic: BasicHandle,
    /// Downsize floats through f32 to f16 when the value is unchanged.
    pub optimum_size: bool,
    /// Emit indefinite-length containers and chunked strings.
    pub indefinite_length: bool,
    /// Encode times as tag 0 RFC 3339 strings instead of tag 1 epoch.
    pub time_rfc3339: bool,
    /// Silently unwrap tags that are neither standard nor registered.
    pub skip_unexpected_tags: bool,
    /// Decode nil where a container is expected as a zero-length one.
    pub nil_collection_to_zero_length: bool,
}

handle_factories!(CborHandle, CborEncoder, CborDecoder);

/// MessagePack handle.
#[derive(Default)]
pub struct MsgpackHandle {
    pub basic: BasicHandle,
    /// Use the 2017 spec: distinct str/bin families and ext support. Off
    /// means the legacy single "raw" family.
    pub write_ext: bool,
    /// Always use the widest fixed-width integer forms.
    pub no_fixed_num: bool,
    /// Decode positive integers as unsigned even from signed forms.
    pub positive_int_unsigned: bool,
    /// Decode legacy raw (and str) payloads as strings rather than bytes.
    pub raw_to_string: bool,
    /// Accept an array of small uints where bytes are wanted.
    pub bytes_from_array: bool,
}

handle_factories!(MsgpackHandle, MsgpackEncoder, MsgpackDecoder);

/// JSON handle.
#[derive(Default)]
pub struct JsonHandle {
    pub basic: BasicHandle,
    /// Pretty-print nesting: positive for that many spaces, negative for
    /// that many tabs, zero for compact output.
    pub indent: i8,
    pub integer_as_string: IntegerAsString,
    /// Decode all numbers as floats.
    pub prefer_float: bool,
    /// Leave `<`, `>`, `&` unescaped in strings.
    pub html_chars_as_is: bool,
    /// Render non-string map keys as quoted strings.
    pub map_key_as_string: bool,
    /// Append a trailing space after a complete top-level value.
    pub term_whitespace: bool,
    pub time_format: JsonTimeFormat,
    pub bytes_format: JsonBytesFormat,
}

handle_factories!(JsonHandle, JsonEncoder, JsonDecoder);

/// Handle for the Simple binary format.
#[derive(Default)]
pub struct SimpleHandle {
    pub basic: BasicHandle,
    /// Encode zero-valued scalars and empty containers as nil.
    pub enc_zero_values_as_nil: bool,
    /// Decode nil where a container is expected as a zero-length one.
    pub nil_collection_to_zero_length: bool,
}

handle_factories!(SimpleHandle, SimpleEncoder, SimpleDecoder);

/// Handle for the Binc binary format.
#[derive(Default)]
pub struct BincHandle {
    pub basic: BasicHandle,
}

handle_factories!(BincHandle, BincEncoder, BincDecoder);
