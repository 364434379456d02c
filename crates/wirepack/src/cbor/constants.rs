pub(crate) const MAJOR_UINT: u8 = 0;
pub(crate) const MAJOR_NEGATIVE: u8 = 1;
pub(crate) const MAJOR_BYTES: u8 = 2;
pub(crate) const MAJOR_STR: u8 = 3;
pub(crate) const MAJOR_ARRAY: u8 = 4;
pub(crate) const MAJOR_MAP: u8 = 5;
pub(crate) const MAJOR_TAG: u8 = 6;

pub(crate) const BD_FALSE: u8 = 0xf4;
pub(crate) const BD_TRUE: u8 = 0xf5;
pub(crate) const BD_NIL: u8 = 0xf6;
pub(crate) const BD_UNDEFINED: u8 = 0xf7;
pub(crate) const BD_F16: u8 = 0xf9;
pub(crate) const BD_F32: u8 = 0xfa;
pub(crate) const BD_F64: u8 = 0xfb;
pub(crate) const BD_BREAK: u8 = 0xff;

pub(crate) const BD_INDEF_STR: u8 = 0x7f;
pub(crate) const BD_INDEF_ARRAY: u8 = 0x9f;
pub(crate) const BD_INDEF_MAP: u8 = 0xbf;

pub(crate) const INFO_INDEFINITE: u8 = 31;

pub(crate) const TAG_TIME_STRING: u64 = 0;
pub(crate) const TAG_TIME_EPOCH: u64 = 1;
pub(crate) const TAG_POS_BIGNUM: u64 = 2;
pub(crate) const TAG_NEG_BIGNUM: u64 = 3;
pub(crate) const TAG_DECIMAL_FRACTION: u64 = 4;
pub(crate) const TAG_BIGFLOAT: u64 = 5;
pub(crate) const TAG_SELF_DESCRIBE: u64 = 55799;
