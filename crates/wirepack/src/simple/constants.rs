pub(crate) const SD_NIL: u8 = 1;
pub(crate) const SD_FALSE: u8 = 2;
pub(crate) const SD_TRUE: u8 = 3;
pub(crate) const SD_F32: u8 = 4;
pub(crate) const SD_F64: u8 = 5;

/// `+0..+3` select a 1/2/4/8-byte big-endian magnitude.
pub(crate) const SD_POS_INT: u8 = 8;
pub(crate) const SD_NEG_INT: u8 = 12;

/// Followed by a one-byte payload length, then the payload.
pub(crate) const SD_TIME: u8 = 24;

/// `+0` means length zero; `+1..+4` select a u8/u16/u32/u64 length.
pub(crate) const SD_STR: u8 = 216;
pub(crate) const SD_BYTES: u8 = 224;
pub(crate) const SD_ARRAY: u8 = 232;
pub(crate) const SD_MAP: u8 = 240;
pub(crate) const SD_EXT: u8 = 248;
