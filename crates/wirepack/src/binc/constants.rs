//! Descriptor layout: `bd = vd << 4 | vs`.

pub(crate) const VD_SPECIAL: u8 = 0;
pub(crate) const VD_POS_INT: u8 = 1;
pub(crate) const VD_NEG_INT: u8 = 2;
pub(crate) const VD_FLOAT: u8 = 3;
pub(crate) const VD_STR: u8 = 4;
pub(crate) const VD_BYTES: u8 = 5;
pub(crate) const VD_ARRAY: u8 = 6;
pub(crate) const VD_MAP: u8 = 7;
pub(crate) const VD_TIME: u8 = 8;
pub(crate) const VD_SMALL_INT: u8 = 9;
pub(crate) const VD_SYMBOL: u8 = 11;
pub(crate) const VD_EXT: u8 = 15;

pub(crate) const SP_NIL: u8 = 0;
pub(crate) const SP_FALSE: u8 = 1;
pub(crate) const SP_TRUE: u8 = 2;
pub(crate) const SP_NAN: u8 = 3;
pub(crate) const SP_POS_INF: u8 = 4;
pub(crate) const SP_NEG_INF: u8 = 5;
pub(crate) const SP_ZERO_FLOAT: u8 = 6;
pub(crate) const SP_ZERO: u8 = 7;
pub(crate) const SP_NEG_ONE: u8 = 8;

pub(crate) const FL_F32: u8 = 1;
pub(crate) const FL_F64: u8 = 3;
/// Set on the float sub-descriptor when a significant-byte count follows.
pub(crate) const FL_PRUNED: u8 = 8;
