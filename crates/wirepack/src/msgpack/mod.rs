//! MessagePack driver, covering both the 2017 spec (distinct str/bin
//! families, extensions, timestamps) and the legacy single-raw encoding.

mod constants;
mod decoder;
mod encoder;

pub use decoder::MsgpackDecoder;
pub use encoder::MsgpackEncoder;
