//! Extension registry: user tags mapped to converters or to self-describing
//! (same-format) payloads.

use crate::error::CodecError;
use crate::value::Value;

/// A tagged value whose payload was not interpreted.
///
/// `data` holds the wire payload. When a user builds one for encoding it may
/// carry `value` instead, in which case the payload is produced at encode
/// time (see the registry).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawExt {
    pub tag: u64,
    pub data: Vec<u8>,
    pub value: Option<Box<Value>>,
}

impl RawExt {
    pub fn new(tag: u64, data: Vec<u8>) -> Self {
        Self {
            tag,
            data,
            value: None,
        }
    }

    pub fn with_value(tag: u64, value: Value) -> Self {
        Self {
            tag,
            data: Vec::new(),
            value: Some(Box::new(value)),
        }
    }
}

/// Converts between a domain [`Value`] and a tagged byte payload.
pub trait ExtConverter: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8]) -> Result<Value, CodecError>;
}

pub(crate) enum ExtKind {
    Converter(Box<dyn ExtConverter>),
    /// Payload is the inner value encoded in the ambient format itself.
    SelfDescribing,
}

pub struct ExtEntry {
    tag: u64,
    kind: ExtKind,
}

impl ExtEntry {
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub(crate) fn kind(&self) -> &ExtKind {
        &self.kind
    }
}

/// Tag table, sorted for binary-search lookup.
///
/// Handles own their registry and hand out codecs through `&self`, so the
/// table cannot change once the first codec exists; registration needs
/// `&mut` access to the handle.
#[derive(Default)]
pub struct ExtRegistry {
    entries: Vec<ExtEntry>,
}

impl ExtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter for `tag`. A tag can be bound once.
    pub fn register(
        &mut self,
        tag: u64,
        converter: Box<dyn ExtConverter>,
    ) -> Result<(), CodecError> {
        self.insert(tag, ExtKind::Converter(converter))
    }

    /// Registers `tag` as self-describing: its payload is a complete value
    /// in the same format, encoded and decoded recursively.
    pub fn register_self_describing(&mut self, tag: u64) -> Result<(), CodecError> {
        self.insert(tag, ExtKind::SelfDescribing)
    }

    fn insert(&mut self, tag: u64, kind: ExtKind) -> Result<(), CodecError> {
        match self.entries.binary_search_by_key(&tag, |e| e.tag) {
            Ok(_) => Err(CodecError::DuplicateExtTag(tag)),
            Err(pos) => {
                self.entries.insert(pos, ExtEntry { tag, kind });
                Ok(())
            }
        }
    }

    pub fn lookup(&self, tag: u64) -> Option<&ExtEntry> {
        self.entries
            .binary_search_by_key(&tag, |e| e.tag)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
