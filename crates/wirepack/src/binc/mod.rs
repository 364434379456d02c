//! Binc binary format driver. Descriptors pack a kind nibble and a
//! sub-descriptor nibble; integers and float significands are pruned to
//! their significant bytes on the wire.

mod constants;
mod decoder;
mod encoder;

pub use decoder::BincDecoder;
pub use encoder::BincEncoder;
