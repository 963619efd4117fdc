//! Signed 64.64 fixed-point kernel
//!
//! Thin layer over [`fixed::types::I64F64`] adding checked arithmetic that
//! reports [`LmsrError`] instead of `None`, plus the transcendental functions
//! the pricing formulas need. Both `exp` and `ln` are evaluated with range
//! reduction and a truncated series, so results are bit-for-bit deterministic
//! on every platform.

use crate::error::{LmsrError, Result};
use fixed::types::I64F64;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Internal number type: 64 integer bits, 64 fractional bits, signed
pub type Fixed = I64F64;

const FRAC_BITS: u32 = 64;

pub const ZERO: Fixed = Fixed::from_bits(0);
pub const ONE: Fixed = Fixed::from_bits(1 << FRAC_BITS);
pub const TWO: Fixed = Fixed::from_bits(2 << FRAC_BITS);
pub const HALF: Fixed = Fixed::from_bits(1 << (FRAC_BITS - 1));

/// ln(2) rounded to the nearest 2^-64
pub const LN2: Fixed = Fixed::from_bits(0xB172_17F7_D1CF_79AC);

/// `exp` rejects arguments with `|x| >= EXP_LIMIT`; e^32 keeps every product
/// with a realistic liquidity depth far from the 2^63 integer ceiling.
pub const EXP_LIMIT: Fixed = Fixed::from_bits(32 << FRAC_BITS);

const EXP_SERIES_TERMS: u32 = 24;
const LN_SERIES_TERMS: u32 = 40;

#[inline]
pub fn add(a: Fixed, b: Fixed) -> Result<Fixed> {
    a.checked_add(b).ok_or(LmsrError::Overflow)
}

#[inline]
pub fn sub(a: Fixed, b: Fixed) -> Result<Fixed> {
    a.checked_sub(b).ok_or(LmsrError::Overflow)
}

#[inline]
pub fn mul(a: Fixed, b: Fixed) -> Result<Fixed> {
    a.checked_mul(b).ok_or(LmsrError::Overflow)
}

#[inline]
pub fn div(a: Fixed, b: Fixed) -> Result<Fixed> {
    if b == ZERO {
        return Err(LmsrError::DivisionByZero);
    }
    a.checked_div(b).ok_or(LmsrError::Overflow)
}

#[inline]
pub fn div_int(a: Fixed, n: u32) -> Result<Fixed> {
    div(a, Fixed::from_num(n))
}

/// Natural exponential, valid for `|x| < EXP_LIMIT`
///
/// Reduces `x = k·ln2 + r` with `|r| <= ln2/2`, sums the Taylor series of
/// `e^r` and rescales by `2^k` on the raw bits.
pub fn exp(x: Fixed) -> Result<Fixed> {
    if x.abs() >= EXP_LIMIT {
        return Err(LmsrError::ExpDomain(x));
    }
    if x == ZERO {
        return Ok(ONE);
    }

    let k: i32 = div(x, LN2)?.round().to_num();
    let r = sub(x, mul(LN2, Fixed::from_num(k))?)?;

    let mut sum = ONE;
    let mut term = ONE;
    for n in 1..=EXP_SERIES_TERMS {
        term = div_int(mul(term, r)?, n)?;
        if term == ZERO {
            break;
        }
        sum = add(sum, term)?;
    }

    let bits = sum.to_bits();
    let scaled = if k >= 0 {
        let shift = k as u32;
        if bits.leading_zeros() <= shift {
            return Err(LmsrError::Overflow);
        }
        bits << shift
    } else {
        bits >> k.unsigned_abs().min(127)
    };
    Ok(Fixed::from_bits(scaled))
}

/// Natural logarithm of a strictly positive value
///
/// Normalises `x = m·2^k` with `m` in `[1, 2)` and evaluates
/// `ln m = 2·atanh((m-1)/(m+1))`, whose argument stays below 1/3.
pub fn ln(x: Fixed) -> Result<Fixed> {
    if x <= ZERO {
        return Err(LmsrError::LnDomain(x));
    }
    if x == ONE {
        return Ok(ZERO);
    }

    let bits = x.to_bits();
    let msb = 127 - bits.leading_zeros() as i32;
    let k = msb - FRAC_BITS as i32;
    let mantissa = if k >= 0 {
        Fixed::from_bits(bits >> k as u32)
    } else {
        Fixed::from_bits(bits << k.unsigned_abs())
    };

    let s = div(sub(mantissa, ONE)?, add(mantissa, ONE)?)?;
    let s2 = mul(s, s)?;
    let mut power = s;
    let mut sum = s;
    for n in 1..=LN_SERIES_TERMS {
        power = mul(power, s2)?;
        let term = div_int(power, 2 * n + 1)?;
        if term == ZERO {
            break;
        }
        sum = add(sum, term)?;
    }

    add(mul(sum, TWO)?, mul(LN2, Fixed::from_num(k))?)
}

/// Exact-as-possible conversion of a human-authored decimal into 64.64
pub fn decimal_to_fixed(value: Decimal) -> Result<Fixed> {
    let int_part = value.trunc().to_i64().ok_or(LmsrError::Overflow)?;
    let frac_bits = (value.fract() * two_pow_64())
        .round()
        .to_i128()
        .ok_or(LmsrError::Overflow)?;
    let bits = ((int_part as i128) << FRAC_BITS)
        .checked_add(frac_bits)
        .ok_or(LmsrError::Overflow)?;
    Ok(Fixed::from_bits(bits))
}

/// Lossy (28 significant digits) conversion used for reporting
pub fn fixed_to_decimal(value: Fixed) -> Decimal {
    let bits = value.to_bits();
    let int_part = (bits >> FRAC_BITS) as i64;
    let frac_part = (bits & ((1i128 << FRAC_BITS) - 1)) as u64;
    Decimal::from(int_part) + Decimal::from(frac_part) / two_pow_64()
}

fn two_pow_64() -> Decimal {
    Decimal::from_i128_with_scale(1i128 << FRAC_BITS, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn close(actual: Fixed, expected: f64, rel_tol: f64) -> bool {
        let actual = actual.to_num::<f64>();
        if expected == 0.0 {
            return actual.abs() < rel_tol;
        }
        ((actual - expected) / expected).abs() < rel_tol
    }

    #[test]
    fn test_exp_accuracy() {
        for x in [-3.5f64, -1.0, -0.001, 0.0, 0.5, 1.0, 2.302585, 10.0, 31.5] {
            let result = exp(Fixed::from_num(x)).unwrap();
            assert!(close(result, x.exp(), 1e-12), "exp({}) = {}", x, result);
        }
        // Small results keep absolute, not relative, precision
        let tiny = exp(Fixed::from_num(-20)).unwrap();
        assert!(close(tiny, (-20.0f64).exp(), 1e-8));
    }

    #[test]
    fn test_exp_domain() {
        assert!(matches!(exp(EXP_LIMIT), Err(LmsrError::ExpDomain(_))));
        assert!(matches!(exp(-EXP_LIMIT), Err(LmsrError::ExpDomain(_))));
        assert_eq!(exp(ZERO).unwrap(), ONE);
    }

    #[test]
    fn test_ln_accuracy() {
        for x in [1e-9f64, 0.001, 0.5, 0.999999, 1.000001, 2.0, 10.0, 1e6, 4e15] {
            let result = ln(Fixed::from_num(x)).unwrap();
            assert!(close(result, x.ln(), 1e-11), "ln({}) = {}", x, result);
        }
        assert_eq!(ln(ONE).unwrap(), ZERO);
    }

    #[test]
    fn test_ln_domain() {
        assert!(matches!(ln(ZERO), Err(LmsrError::LnDomain(_))));
        assert!(matches!(ln(-ONE), Err(LmsrError::LnDomain(_))));
    }

    #[test]
    fn test_exp_ln_inverse() {
        let x = Fixed::from_num(3.25);
        let back = ln(exp(x).unwrap()).unwrap();
        assert!((back - x).abs() < Fixed::from_num(1e-15));
    }

    #[test]
    fn test_ln2_constant() {
        assert!(close(LN2, std::f64::consts::LN_2, 1e-15));
    }

    #[test]
    fn test_checked_helpers() {
        assert_eq!(div(ONE, ZERO), Err(LmsrError::DivisionByZero));
        assert_eq!(mul(Fixed::MAX, TWO), Err(LmsrError::Overflow));
        assert_eq!(add(ONE, ONE).unwrap(), TWO);
        assert_eq!(div_int(ONE, 2).unwrap(), HALF);
    }

    #[test]
    fn test_decimal_round_trip() {
        let value = dec!(3.3333333333);
        let fixed = decimal_to_fixed(value).unwrap();
        assert!(close(fixed, 3.3333333333, 1e-15));
        let back = fixed_to_decimal(fixed);
        assert!((back - value).abs() < dec!(0.0000000001));

        let negative = decimal_to_fixed(dec!(-1.5)).unwrap();
        assert_eq!(negative, Fixed::from_num(-1.5));
        assert_eq!(fixed_to_decimal(negative), dec!(-1.5));
    }
}
