//! Conversions between external integer amounts and internal 64.64 units
//!
//! Each asset has a base denominator: internal = external / base. Amounts
//! entering the internal domain are floored; amounts leaving it are rounded
//! up when the pool receives them and down when the pool pays them out, so
//! rounding always favours the pool.

use crate::error::{LmsrError, Result};
use crate::fixed_math::{Fixed, ZERO};

/// Fees are quoted in pips
pub const FEE_DENOMINATOR: u128 = 1_000_000;

const FRAC_BITS: u32 = 64;
const FRAC_MASK: u128 = (1u128 << FRAC_BITS) - 1;

/// floor(num / den) as 64.64
pub fn ratio_floor(num: u128, den: u128) -> Result<Fixed> {
    ratio(num, den).map(|(bits, _)| Fixed::from_bits(bits))
}

/// ceil(num / den) as 64.64
pub fn ratio_ceil(num: u128, den: u128) -> Result<Fixed> {
    let (bits, inexact) = ratio(num, den)?;
    let bits = if inexact {
        bits.checked_add(1).ok_or(LmsrError::Overflow)?
    } else {
        bits
    };
    Ok(Fixed::from_bits(bits))
}

/// Raw bits of num/den truncated to 64 fractional bits, plus whether any
/// remainder was dropped. The fraction is produced by bitwise long division
/// so any u128 denominator works.
fn ratio(num: u128, den: u128) -> Result<(i128, bool)> {
    if den == 0 {
        return Err(LmsrError::ZeroBase);
    }
    let whole = num / den;
    if whole >= 1u128 << 63 {
        return Err(LmsrError::Overflow);
    }

    let mut rem = num % den;
    let mut frac: u128 = 0;
    for _ in 0..FRAC_BITS {
        let carry = rem >> 127;
        rem <<= 1;
        frac <<= 1;
        if carry == 1 || rem >= den {
            rem = rem.wrapping_sub(den);
            frac |= 1;
        }
    }
    Ok((((whole << FRAC_BITS) | frac) as i128, rem != 0))
}

/// External amount to internal units, rounded down
pub fn to_internal(amount: u128, base: u64) -> Result<Fixed> {
    ratio_floor(amount, base as u128)
}

/// floor(x·n) for non-negative x
pub fn mul_fixed_floor(x: Fixed, n: u128) -> Result<u128> {
    mul_parts(x, n).map(|(whole, _)| whole)
}

/// ceil(x·n) for non-negative x
pub fn mul_fixed_ceil(x: Fixed, n: u128) -> Result<u128> {
    let (whole, inexact) = mul_parts(x, n)?;
    if inexact {
        whole.checked_add(1).ok_or(LmsrError::Overflow)
    } else {
        Ok(whole)
    }
}

/// x·n split as integer part plus "fraction dropped" flag.
/// With x = ip + fr/2^64 and n = nh·2^64 + nl:
/// x·n = ip·n + fr·nh + (fr·nl) >> 64
fn mul_parts(x: Fixed, n: u128) -> Result<(u128, bool)> {
    if x < ZERO {
        return Err(LmsrError::NegativeAmount(x));
    }
    let bits = x.to_bits() as u128;
    let ip = bits >> FRAC_BITS;
    let fr = bits & FRAC_MASK;
    let nh = n >> FRAC_BITS;
    let nl = n & FRAC_MASK;

    let whole = ip.checked_mul(n).ok_or(LmsrError::Overflow)?;
    // fr, nh, nl < 2^64, so neither product overflows
    let middle = fr * nh;
    let low = fr * nl;
    let whole = whole
        .checked_add(middle)
        .and_then(|w| w.checked_add(low >> FRAC_BITS))
        .ok_or(LmsrError::Overflow)?;
    Ok((whole, low & FRAC_MASK != 0))
}

/// Internal amount the pool pays out, rounded down
pub fn to_external_floor(x: Fixed, base: u64) -> Result<u128> {
    mul_fixed_floor(x, base as u128)
}

/// Internal amount the pool receives, rounded up
pub fn to_external_ceil(x: Fixed, base: u64) -> Result<u128> {
    mul_fixed_ceil(x, base as u128)
}

/// Pair fee: the sum of both assets' fees
pub fn pair_fee_pips(fee_in: u32, fee_out: u32) -> Result<u32> {
    let total = fee_in.checked_add(fee_out).ok_or(LmsrError::Overflow)?;
    if total as u128 >= FEE_DENOMINATOR {
        return Err(LmsrError::InvalidFee(total));
    }
    Ok(total)
}

/// ceil(amount·fee/1e6)
pub fn fee_ceil(amount: u128, fee_pips: u32) -> Result<u128> {
    if fee_pips as u128 >= FEE_DENOMINATOR {
        return Err(LmsrError::InvalidFee(fee_pips));
    }
    let scaled = amount.checked_mul(fee_pips as u128).ok_or(LmsrError::Overflow)?;
    Ok(scaled.div_ceil(FEE_DENOMINATOR))
}

/// Smallest gross amount whose net after `fee_pips` covers `net`:
/// ceil(net·1e6/(1e6 - fee))
pub fn gross_up(net: u128, fee_pips: u32) -> Result<u128> {
    if fee_pips as u128 >= FEE_DENOMINATOR {
        return Err(LmsrError::InvalidFee(fee_pips));
    }
    let scaled = net.checked_mul(FEE_DENOMINATOR).ok_or(LmsrError::Overflow)?;
    Ok(scaled.div_ceil(FEE_DENOMINATOR - fee_pips as u128))
}

/// floor(amount·share/1e6), the protocol's cut of a collected fee
pub fn share_of(amount: u128, share_pips: u32) -> Result<u128> {
    let scaled = amount.checked_mul(share_pips as u128).ok_or(LmsrError::Overflow)?;
    Ok(scaled / FEE_DENOMINATOR)
}
