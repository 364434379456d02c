pub(crate) const MP_POS_FIX_MAX: u8 = 0x7f;

pub(crate) const MP_NIL: u8 = 0xc0;
pub(crate) const MP_UNUSED: u8 = 0xc1;
pub(crate) const MP_FALSE: u8 = 0xc2;
pub(crate) const MP_TRUE: u8 = 0xc3;

pub(crate) const MP_BIN8: u8 = 0xc4;
pub(crate) const MP_BIN16: u8 = 0xc5;
pub(crate) const MP_BIN32: u8 = 0xc6;

pub(crate) const MP_EXT8: u8 = 0xc7;
pub(crate) const MP_EXT16: u8 = 0xc8;
pub(crate) const MP_EXT32: u8 = 0xc9;

pub(crate) const MP_F32: u8 = 0xca;
pub(crate) const MP_F64: u8 = 0xcb;

pub(crate) const MP_UINT8: u8 = 0xcc;
pub(crate) const MP_UINT16: u8 = 0xcd;
pub(crate) const MP_UINT32: u8 = 0xce;
pub(crate) const MP_UINT64: u8 = 0xcf;

pub(crate) const MP_INT8: u8 = 0xd0;
pub(crate) const MP_INT16: u8 = 0xd1;
pub(crate) const MP_INT32: u8 = 0xd2;
pub(crate) const MP_INT64: u8 = 0xd3;

pub(crate) const MP_FIXEXT1: u8 = 0xd4;
pub(crate) const MP_FIXEXT2: u8 = 0xd5;
pub(crate) const MP_FIXEXT4: u8 = 0xd6;
pub(crate) const MP_FIXEXT8: u8 = 0xd7;
pub(crate) const MP_FIXEXT16: u8 = 0xd8;

pub(crate) const MP_STR8: u8 = 0xd9;
pub(crate) const MP_STR16: u8 = 0xda;
pub(crate) const MP_STR32: u8 = 0xdb;

pub(crate) const MP_ARRAY16: u8 = 0xdc;
pub(crate) const MP_ARRAY32: u8 = 0xdd;
pub(crate) const MP_MAP16: u8 = 0xde;
pub(crate) const MP_MAP32: u8 = 0xdf;

pub(crate) const MP_FIX_STR: u8 = 0xa0;
pub(crate) const MP_FIX_ARRAY: u8 = 0x90;
pub(crate) const MP_FIX_MAP: u8 = 0x80;

pub(crate) const MP_NEG_FIX_MIN: u8 = 0xe0;

/// Reserved extension type for timestamps (-1 as a byte).
pub(crate) const MP_TIME_EXT_TAG: u8 = 0xff;
