//! Liquidity parameter from a slippage target
//!
//! In a balanced pool of n assets with q each, a trade a = f·q sees
//!
//! ```text
//! slippage(u) = u / ln(2 - e^(-u)) - 1,    u = a/b = f/(κ·n)
//! ```
//!
//! which is strictly increasing in u. Bisect for the u that hits the target,
//! then κ = f/(u·n).

use crate::error::{LmsrError, Result};
use crate::fixed_math::{add, div, exp, ln, mul, sub, Fixed, HALF, ONE, TWO, ZERO};
use tracing::debug;

const MAX_ITERATIONS: u32 = 128;

/// Upper end of the u search; slippage(16) is far beyond any sane target
const U_CEILING: Fixed = Fixed::from_bits(16 << 64);

/// Stop once the bracket is narrower than 2^-60
const U_RESOLUTION: Fixed = Fixed::from_bits(1 << 4);

/// Relative slippage of a balanced exact-input trade with u = a/b
pub fn balanced_slippage(u: Fixed) -> Result<Fixed> {
    if u <= ZERO {
        return Err(LmsrError::NonPositiveAmount(u));
    }
    let out_over_b = ln(sub(TWO, exp(-u)?)?)?;
    sub(div(u, out_over_b)?, ONE)
}

/// κ such that a `trade_fraction` trade in a balanced pool of `n_assets`
/// slips by `target_slippage`
pub fn kappa_from_slippage(n_assets: usize, trade_fraction: Fixed, target_slippage: Fixed) -> Result<Fixed> {
    if n_assets < 2 {
        return Err(LmsrError::TooFewAssets(n_assets));
    }
    if trade_fraction <= ZERO {
        return Err(LmsrError::NonPositiveAmount(trade_fraction));
    }
    if target_slippage <= ZERO {
        return Err(LmsrError::NonPositiveAmount(target_slippage));
    }
    if balanced_slippage(U_CEILING)? < target_slippage {
        return Err(LmsrError::DegenerateTrade("slippage target unreachable"));
    }

    let mut low = ZERO;
    let mut high = U_CEILING;
    let mut iterations = 0;
    while sub(high, low)? > U_RESOLUTION && iterations < MAX_ITERATIONS {
        let mid = add(low, mul(sub(high, low)?, HALF)?)?;
        if balanced_slippage(mid)? < target_slippage {
            low = mid;
        } else {
            high = mid;
        }
        iterations += 1;
    }

    let u = mul(add(low, high)?, HALF)?;
    let kappa = div(trade_fraction, mul(u, Fixed::from_num(n_assets))?)?;
    debug!(kappa = %kappa, u = %u, iterations, "Derived kappa from slippage target");
    if kappa <= ZERO {
        return Err(LmsrError::NonPositiveKappa(kappa));
    }
    Ok(kappa)
}
