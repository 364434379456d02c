//! Multi-format value codec engine.
//!
//! One value model, five wire formats: CBOR (RFC 8949), MessagePack, JSON,
//! Simple and Binc. Each format pairs a handle (configuration plus the
//! extension registry) with an encode and a decode driver behind the
//! [`Encoder`] and [`Decoder`] traits; the format-agnostic walkers
//! [`write_value`] and [`read_value`] drive them.
//!
//! ```
//! use wirepack::{CborHandle, Value};
//!
//! let h = CborHandle::new();
//! let bytes = h.encode_value(&Value::Array(vec![
//!     Value::Uint(10),
//!     Value::Str("IETF".into()),
//! ]))?;
//! assert_eq!(h.decode_value(&bytes)?, Value::Array(vec![
//!     Value::Uint(10),
//!     Value::Str("IETF".into()),
//! ]));
//! # Ok::<(), wirepack::CodecError>(())
//! ```

mod binc;
mod cbor;
mod codec;
mod error;
mod ext;
mod handle;
mod json;
mod msgpack;
mod num;
mod simple;
mod value;

pub use binc::{BincDecoder, BincEncoder};
pub use cbor::{CborDecoder, CborEncoder};
pub use codec::{read_value, write_value, Decoder, Encoder};
pub use error::CodecError;
pub use ext::{ExtConverter, ExtEntry, ExtRegistry, RawExt};
pub use handle::{
    BasicHandle, BincHandle, CborHandle, IntegerAsString, JsonBytesFormat, JsonHandle,
    JsonTimeFormat, MsgpackHandle, SimpleHandle,
};
pub use json::{JsonDecoder, JsonEncoder};
pub use msgpack::{MsgpackDecoder, MsgpackEncoder};
pub use simple::{SimpleDecoder, SimpleEncoder};
pub use value::{ContainerKind, Len, Naked, Value};

pub use wirepack_buffers::{BufferError, BytesAttach, IoReader, SliceReader, WireRead, Writer};
