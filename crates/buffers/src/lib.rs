//! Byte-level wire readers and writers shared by the wirepack codecs.
//!
//! The [`Writer`] is an auto-growing output buffer with fused
//! descriptor+payload writes. Input comes through the [`WireRead`] trait,
//! implemented by [`SliceReader`] for in-memory buffers (zero-copy views)
//! and [`IoReader`] for blocking streams (buffered views).

mod error;
mod io_reader;
mod read;
mod writer;

pub use error::BufferError;
pub use io_reader::IoReader;
pub use read::{BytesAttach, SliceReader, WireRead};
pub use writer::Writer;
