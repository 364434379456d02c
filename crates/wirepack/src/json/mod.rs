//! JSON driver. Encodes the closed value set as standard JSON text and
//! decodes any standard JSON document; numbers, times and byte strings map
//! through the `JsonHandle` configuration.

mod decoder;
mod encoder;

pub use decoder::JsonDecoder;
pub use encoder::JsonEncoder;
