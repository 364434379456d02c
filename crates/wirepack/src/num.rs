//! Decimal number reading and checked numeric narrowing.
//!
//! The float reader is a single-pass scan that classifies each number as
//! either exactly reconstructible from mantissa and power of ten, or hard.
//! Hard numbers (truncated mantissa, large exponents) fall back to the
//! standard library parser. Exact reconstruction covers the common case of
//! JSON numbers with modest precision without any rounding slop.

use half::f16;

use crate::error::CodecError;

const POW10_U64: [u64; 20] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
    10_000_000_000_000_000_000,
];

const POW10_F64: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

const POW10_F32: [f32; 11] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10,
];

// Multiplying past these loses integer exactness (10^exact_ints).
const MAX_EXACT_MULTIPLIER_F64: f64 = 1e15;
const MAX_EXACT_MULTIPLIER_F32: f32 = 1e7;

const U64_CUTOFF: u64 = (u64::MAX / 10) + 1;

struct FloatInfo {
    mantbits: u32,
    /// Powers of ten at or below this are exact in the target type.
    exact_pow10: i32,
    /// Integers up to 10^exact_ints are exact in the target type.
    exact_ints: i32,
    mant_cutoff: u64,
    cutoff_is_u64: bool,
}

const FI32: FloatInfo = FloatInfo {
    mantbits: 23,
    exact_pow10: 10,
    exact_ints: 7,
    mant_cutoff: (1 << 23) - 1,
    cutoff_is_u64: false,
};

const FI64: FloatInfo = FloatInfo {
    mantbits: 52,
    exact_pow10: 22,
    exact_ints: 15,
    mant_cutoff: (1 << 52) - 1,
    cutoff_is_u64: false,
};

const FI64U: FloatInfo = FloatInfo {
    mantbits: 0,
    exact_pow10: 19,
    exact_ints: 0,
    mant_cutoff: U64_CUTOFF,
    cutoff_is_u64: true,
};

#[derive(Default)]
struct ReadFloatResult {
    mantissa: u64,
    exp: i32,
    neg: bool,
    trunc: bool,
    bad: bool,
    hardexp: bool,
    ok: bool,
}

/// Single-pass decimal scan. Sets `ok` only when the mantissa and exponent
/// permit exact reconstruction; `bad` flags a syntax error (including
/// leading zeros, which the JSON grammar forbids).
fn read_float(s: &[u8], y: &FloatInfo) -> ReadFloatResult {
    let mut r = ReadFloatResult::default();
    let slen = s.len();
    if slen == 0 {
        r.ok = true;
        return r;
    }

    let mut i = 0usize;
    if s[0] == b'-' {
        r.neg = true;
        i += 1;
    }

    // A leading zero must be the whole integer part.
    if i + 1 < slen && s[i] == b'0' && !matches!(s[i + 1], b'.' | b'e' | b'E') {
        r.bad = true;
        return r;
    }

    let mut nd: i32 = 0;
    let mut nd_mant: i32 = 0;
    let mut dp: i32 = 0;
    let mut sawdot = false;
    let mut sawexp = false;

    while i < slen {
        match s[i] {
            b'.' => {
                if sawdot {
                    r.bad = true;
                    return r;
                }
                sawdot = true;
                dp = nd;
            }
            b'e' | b'E' => {
                sawexp = true;
                break;
            }
            b'0' => {
                if nd == 0 {
                    // zeros before the first significant digit shift dp
                    dp -= 1;
                    i += 1;
                    continue;
                }
                nd += 1;
                if r.mantissa < y.mant_cutoff {
                    r.mantissa *= 10;
                    nd_mant += 1;
                }
            }
            c @ b'1'..=b'9' => {
                nd += 1;
                if y.cutoff_is_u64 && r.mantissa < U64_CUTOFF {
                    r.mantissa *= 10;
                    let xu = r.mantissa.wrapping_add((c - b'0') as u64);
                    if xu < r.mantissa {
                        r.trunc = true;
                        return r;
                    }
                    r.mantissa = xu;
                } else if r.mantissa < y.mant_cutoff {
                    r.mantissa = r.mantissa * 10 + (c - b'0') as u64;
                } else {
                    r.trunc = true;
                    return r;
                }
                nd_mant += 1;
            }
            _ => {
                r.bad = true;
                return r;
            }
        }
        i += 1;
    }

    if !sawdot {
        dp = nd;
    }

    if sawexp {
        i += 1;
        let mut eneg = false;
        if i < slen && matches!(s[i], b'+' | b'-') {
            eneg = s[i] == b'-';
            i += 1;
        }
        // an exponent must carry at least one digit
        if i >= slen {
            r.bad = true;
            return r;
        }
        // exact reconstruction only reaches 2-digit exponents
        if i + 2 < slen {
            r.hardexp = true;
            return r;
        }
        if !s[i].is_ascii_digit() {
            r.bad = true;
            return r;
        }
        let mut e = (s[i] - b'0') as i32;
        i += 1;
        if i < slen {
            if !s[i].is_ascii_digit() {
                r.bad = true;
                return r;
            }
            e = e * 10 + (s[i] - b'0') as i32;
        }
        if eneg {
            dp -= e;
        } else {
            dp += e;
        }
    }

    if r.mantissa != 0 {
        r.exp = dp - nd_mant;
        if r.exp < -y.exact_pow10
            || r.exp > y.exact_ints + y.exact_pow10
            || (y.mantbits != 0 && r.mantissa >> y.mantbits != 0)
        {
            r.hardexp = true;
            return r;
        }
    }

    r.ok = true;
    r
}

fn reconstruct_f64(r: &ReadFloatResult) -> Option<f64> {
    let mut f = r.mantissa as f64;
    if r.exp < 0 {
        f /= POW10_F64[(-r.exp) as usize];
    } else if r.exp > 0 {
        if r.exp > FI64.exact_pow10 {
            f *= POW10_F64[(r.exp - FI64.exact_pow10) as usize];
            if f > MAX_EXACT_MULTIPLIER_F64 {
                return None;
            }
            f *= POW10_F64[FI64.exact_pow10 as usize];
        } else {
            f *= POW10_F64[r.exp as usize];
        }
    }
    Some(if r.neg { -f } else { f })
}

fn reconstruct_f32(r: &ReadFloatResult) -> Option<f32> {
    let mut f = r.mantissa as f32;
    if r.exp < 0 {
        f /= POW10_F32[(-r.exp) as usize];
    } else if r.exp > 0 {
        if r.exp > FI32.exact_pow10 {
            f *= POW10_F32[(r.exp - FI32.exact_pow10) as usize];
            if f > MAX_EXACT_MULTIPLIER_F32 {
                return None;
            }
            f *= POW10_F32[FI32.exact_pow10 as usize];
        } else {
            f *= POW10_F32[r.exp as usize];
        }
    }
    Some(if r.neg { -f } else { f })
}

fn std_parse_f64(b: &[u8]) -> Option<f64> {
    std::str::from_utf8(b).ok()?.parse().ok()
}

/// Parses a decimal float, exactly where possible, via the standard parser
/// otherwise. `None` means the bytes are not a valid number.
pub(crate) fn parse_f64(b: &[u8]) -> Option<f64> {
    let r = read_float(b, &FI64);
    if r.bad {
        return None;
    }
    if r.ok {
        if let Some(f) = reconstruct_f64(&r) {
            return Some(f);
        }
    }
    std_parse_f64(b)
}

pub(crate) fn parse_f32(b: &[u8]) -> Option<f32> {
    let r = read_float(b, &FI32);
    if r.bad {
        return None;
    }
    if r.ok {
        if let Some(f) = reconstruct_f32(&r) {
            return Some(f);
        }
    }
    Some(std_parse_f64(b)? as f32)
}

/// Parses `[0-9]+` into a u64 with overflow detection. Punts on leading
/// zeros and anything non-digit.
pub(crate) fn parse_u64_simple(b: &[u8]) -> Option<u64> {
    if b.is_empty() || (b.len() > 1 && b[0] == b'0') {
        return None;
    }
    let mut n: u64 = 0;
    for &c in b {
        if !c.is_ascii_digit() {
            return None;
        }
        n = n
            .checked_mul(10)?
            .checked_add((c - b'0') as u64)?;
    }
    Some(n)
}

/// Outcome of a naked number parse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Uint(u64),
    Int(i64),
    Float(f64),
}

/// Parses a JSON-style number. Integer-only syntax yields an integer
/// (signed per `signed_integer` or when negative). Float syntax yields a
/// float, except that with `prefer_float` off an integer-valued float in
/// range folds back to an integer.
pub(crate) fn parse_number(b: &[u8], prefer_float: bool, signed_integer: bool) -> Option<Num> {
    if b.is_empty() {
        return None;
    }
    if !prefer_float {
        let (neg, digits) = if b[0] == b'-' {
            (true, &b[1..])
        } else {
            (false, b)
        };
        if let Some(u) = parse_u64_simple(digits) {
            return if neg {
                if u > (1u64 << 63) {
                    None
                } else {
                    Some(Num::Int((-(u as i128)) as i64))
                }
            } else if signed_integer {
                if u > i64::MAX as u64 {
                    None
                } else {
                    Some(Num::Int(u as i64))
                }
            } else {
                Some(Num::Uint(u))
            };
        }
    }
    let f = parse_f64(b)?;
    if !prefer_float && no_frac_f64(f) {
        if f >= 0.0 && f < 18_446_744_073_709_551_616.0 {
            let u = f as u64;
            return if signed_integer && u <= i64::MAX as u64 {
                Some(Num::Int(u as i64))
            } else if signed_integer {
                Some(Num::Float(f))
            } else {
                Some(Num::Uint(u))
            };
        }
        if f < 0.0 && f >= i64::MIN as f64 {
            return Some(Num::Int(f as i64));
        }
    }
    Some(Num::Float(f))
}

/// True when the float has no fractional part (inspecting IEEE-754 bits).
pub(crate) fn no_frac_f64(f: f64) -> bool {
    let bits = f.to_bits();
    if bits << 1 == 0 {
        return true; // +/- zero
    }
    if !f.is_finite() {
        return false;
    }
    let exp = ((bits >> 52) & 0x7ff) as i64 - 1023;
    if exp < 0 {
        return false;
    }
    if exp >= 52 {
        return true;
    }
    bits & ((1u64 << (52 - exp)) - 1) == 0
}

pub(crate) fn no_frac_f32(f: f32) -> bool {
    let bits = f.to_bits();
    if bits << 1 == 0 {
        return true;
    }
    if !f.is_finite() {
        return false;
    }
    let exp = ((bits >> 23) & 0xff) as i32 - 127;
    if exp < 0 {
        return false;
    }
    if exp >= 23 {
        return true;
    }
    bits & ((1u32 << (23 - exp)) - 1) == 0
}

// ---- checked narrowing ----

pub(crate) fn u64_to_i64(u: u64, offset: usize) -> Result<i64, CodecError> {
    if u > i64::MAX as u64 {
        return Err(CodecError::Overflow {
            what: "unsigned integer",
            offset,
        });
    }
    Ok(u as i64)
}

pub(crate) fn i64_to_u64(i: i64, offset: usize) -> Result<u64, CodecError> {
    if i < 0 {
        return Err(CodecError::Overflow {
            what: "negative integer",
            offset,
        });
    }
    Ok(i as u64)
}

pub(crate) fn f64_to_i64(f: f64, offset: usize) -> Result<i64, CodecError> {
    if !no_frac_f64(f) || f < i64::MIN as f64 || f >= -(i64::MIN as f64) {
        return Err(CodecError::Overflow {
            what: "float",
            offset,
        });
    }
    Ok(f as i64)
}

pub(crate) fn f64_to_u64(f: f64, offset: usize) -> Result<u64, CodecError> {
    if !no_frac_f64(f) || f < 0.0 || f >= 18_446_744_073_709_551_616.0 {
        return Err(CodecError::Overflow {
            what: "float",
            offset,
        });
    }
    Ok(f as u64)
}

/// Narrows an f64 to f32 only when the value survives unchanged.
pub(crate) fn f64_to_f32_exact(v: f64) -> Option<f32> {
    let f = v as f32;
    if f as f64 == v {
        Some(f)
    } else {
        None
    }
}

/// Narrows an f32 to a half float only when the value survives unchanged.
pub(crate) fn f32_to_f16_exact(v: f32) -> Option<f16> {
    let h = f16::from_f32(v);
    if h.to_f32() == v {
        Some(h)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_small_decimals() {
        assert_eq!(parse_f64(b"1.1"), Some(1.1));
        assert_eq!(parse_f64(b"0.0007"), Some(0.0007));
        assert_eq!(parse_f64(b"-2.5"), Some(-2.5));
        assert_eq!(parse_f64(b"0"), Some(0.0));
        assert_eq!(parse_f64(b"-0"), Some(-0.0));
    }

    #[test]
    fn exponent_forms() {
        assert_eq!(parse_f64(b"1e2"), Some(100.0));
        assert_eq!(parse_f64(b"1.27e+8"), Some(127000000.0));
        assert_eq!(parse_f64(b"7e20"), Some(7e20));
        assert_eq!(parse_f64(b"1e-7"), Some(1e-7));
    }

    #[test]
    fn hard_cases_fall_back_to_std() {
        // 17 significant digits truncate the fast mantissa
        let s = b"3.1415926535897932";
        assert_eq!(parse_f64(s), Some("3.1415926535897932".parse().unwrap()));
        // 3-digit exponent
        assert_eq!(parse_f64(b"1e300"), Some(1e300));
        assert_eq!(parse_f64(b"2.5e-300"), Some(2.5e-300));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse_f64(b"01"), None);
        assert_eq!(parse_f64(b"1.2.3"), None);
        assert_eq!(parse_f64(b"1x"), None);
        assert_eq!(parse_f64(b"1e+x"), None);
        assert_eq!(parse_f64(b"--1"), None);
        // an exponent needs at least one digit
        assert_eq!(parse_f64(b"1e"), None);
        assert_eq!(parse_f64(b"1e+"), None);
        assert_eq!(parse_f64(b"1e-"), None);
    }

    #[test]
    fn u64_simple_bounds() {
        assert_eq!(parse_u64_simple(b"0"), Some(0));
        assert_eq!(parse_u64_simple(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_u64_simple(b"18446744073709551616"), None);
        assert_eq!(parse_u64_simple(b"007"), None);
        assert_eq!(parse_u64_simple(b"1e2"), None);
    }

    #[test]
    fn number_dispatch() {
        assert_eq!(parse_number(b"200", false, false), Some(Num::Uint(200)));
        assert_eq!(parse_number(b"200", false, true), Some(Num::Int(200)));
        assert_eq!(parse_number(b"-200", false, false), Some(Num::Int(-200)));
        assert_eq!(
            parse_number(b"-9223372036854775808", false, false),
            Some(Num::Int(i64::MIN))
        );
        assert_eq!(parse_number(b"1.5", false, false), Some(Num::Float(1.5)));
        // integer-valued float syntax folds back to an integer
        assert_eq!(parse_number(b"1e2", false, false), Some(Num::Uint(100)));
        assert_eq!(parse_number(b"1e2", true, false), Some(Num::Float(100.0)));
        assert_eq!(parse_number(b"100.0", false, true), Some(Num::Int(100)));
    }

    #[test]
    fn frac_bit_checks() {
        assert!(no_frac_f64(0.0));
        assert!(no_frac_f64(-0.0));
        assert!(no_frac_f64(100.0));
        assert!(no_frac_f64(1e300));
        assert!(!no_frac_f64(0.5));
        assert!(!no_frac_f64(100.25));
        assert!(!no_frac_f64(f64::NAN));
        assert!(!no_frac_f64(f64::INFINITY));
        assert!(no_frac_f32(3.0));
        assert!(!no_frac_f32(3.5));
    }

    #[test]
    fn narrowing_guards() {
        assert_eq!(u64_to_i64(5, 0).unwrap(), 5);
        assert!(u64_to_i64(u64::MAX, 0).is_err());
        assert!(i64_to_u64(-1, 0).is_err());
        assert_eq!(f64_to_i64(-3.0, 0).unwrap(), -3);
        assert!(f64_to_i64(3.5, 0).is_err());
        assert!(f64_to_u64(-1.0, 0).is_err());
        assert_eq!(f64_to_u64(3e3, 0).unwrap(), 3000);
    }

    #[test]
    fn exact_float_narrowing() {
        assert_eq!(f64_to_f32_exact(1.5), Some(1.5f32));
        assert_eq!(f64_to_f32_exact(1.1), None);
        assert_eq!(f32_to_f16_exact(1.5), Some(f16::from_f32(1.5)));
        assert_eq!(f32_to_f16_exact(1.1), None);
        // subnormal f16 values survive
        let sub = f16::from_bits(1).to_f32();
        assert_eq!(f32_to_f16_exact(sub), Some(f16::from_bits(1)));
    }
}
