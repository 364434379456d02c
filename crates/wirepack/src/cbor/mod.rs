//! CBOR (RFC 8949) driver.

mod constants;
mod decoder;
mod encoder;

pub use decoder::CborDecoder;
pub use encoder::CborEncoder;
