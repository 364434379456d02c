//! Simple binary format driver: flat one-byte descriptors, big-endian
//! fixed-width arguments, no pruning and no indefinite lengths.

mod constants;
mod decoder;
mod encoder;

pub use decoder::SimpleDecoder;
pub use encoder::SimpleEncoder;
