//! Balanced-pair fast path
//!
//! For two-asset pools trading near parity the exact kernel's `exp`/`ln`
//! calls can be replaced by short Taylor polynomials:
//!
//! ```text
//! delta = (qᵢ - q_j)/b        |delta| <= 1%
//! u     = a/b                  0 < u <= 0.5
//! X     = u·(1 + delta) - u²/2
//! out   = b·(X - X²/2)             u <= 0.1
//! out   = b·(X - X²/2 + X³/3)      0.1 < u <= 0.5
//! ```
//!
//! With a price limit, `r0 ≈ 1 + δ + δ²/2 + δ³/6` and the limit input is
//! `b·ln(1+t)` with `t = L/r0 - 1`, also cubic.
//!
//! Besides the domain guards, the leading truncation terms are estimated and
//! the exact kernel takes over whenever they exceed the configured relative
//! error budget. Whenever the approximation is not used the result is the
//! exact kernel's, bit for bit.
//!
//! The relative truncation error grows like u²/2 and reaches the default
//! budget (2.5e-6) near u = 0.002, so the cubic tier is only ever selected
//! under a looser [`BalancedPairFastPath::with_max_relative_error`].

use crate::cost::liquidity_depth;
use crate::error::Result;
use crate::fixed_math::{add, div, div_int, mul, sub, Fixed, HALF, ONE, ZERO};
use crate::swap_kernel::{SwapKernel, SwapQuote};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// |delta| bound for near-parity pools (1%)
pub const MAX_DELTA: Fixed = Fixed::from_bits(184_467_440_737_095_516);

/// Upper bound on u = a/b
pub const MAX_TRADE_FRACTION: Fixed = Fixed::from_bits(1 << 63);

/// Quadratic ln tier applies up to u = 0.1
pub const QUADRATIC_TIER_LIMIT: Fixed = Fixed::from_bits(1_844_674_407_370_955_162);

/// Largest relative price move a limit may imply (10%)
pub const MAX_LIMIT_MOVE: Fixed = Fixed::from_bits(1_844_674_407_370_955_162);

/// Limits closer than this to the approximated price are left to the exact
/// kernel, which decides "at or below current price" precisely (1e-9)
const LIMIT_MARGIN: Fixed = Fixed::from_bits(18_446_744_074);

/// Default relative error budget (2.5e-6)
pub const DEFAULT_MAX_RELATIVE_ERROR: Fixed = Fixed::from_bits(46_116_860_184_274);

/// Which computation produced a swap quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePath {
    Approximation,
    Exact,
}

/// Swap quote tagged with the path that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FastSwapQuote {
    pub quote: SwapQuote,
    pub path: QuotePath,
}

/// Polynomial approximation of the pairwise kernel for balanced two-asset pools
#[derive(Debug, Clone, Copy)]
pub struct BalancedPairFastPath {
    max_relative_error: Fixed,
}

impl Default for BalancedPairFastPath {
    fn default() -> Self {
        Self {
            max_relative_error: DEFAULT_MAX_RELATIVE_ERROR,
        }
    }
}

impl BalancedPairFastPath {
    pub fn with_max_relative_error(max_relative_error: Fixed) -> Self {
        Self { max_relative_error }
    }

    /// Quote an exact-input swap, approximating when every guard holds and
    /// deferring to [`SwapKernel::swap_amounts_for_exact_input`] otherwise
    pub fn quote(
        &self,
        kappa: Fixed,
        inventory: &[Fixed],
        i: usize,
        j: usize,
        amount_in: Fixed,
        limit_price: Option<Fixed>,
    ) -> Result<FastSwapQuote> {
        if let Ok(Some(quote)) = self.approximate(kappa, inventory, i, j, amount_in, limit_price) {
            return Ok(FastSwapQuote {
                quote,
                path: QuotePath::Approximation,
            });
        }

        let quote = SwapKernel::swap_amounts_for_exact_input(kappa, inventory, i, j, amount_in, limit_price)?;
        Ok(FastSwapQuote {
            quote,
            path: QuotePath::Exact,
        })
    }

    /// `Ok(None)` means a guard failed; arithmetic errors also fall back
    fn approximate(
        &self,
        kappa: Fixed,
        inventory: &[Fixed],
        i: usize,
        j: usize,
        amount_in: Fixed,
        limit_price: Option<Fixed>,
    ) -> Result<Option<SwapQuote>> {
        if inventory.len() != 2 || i >= 2 || j >= 2 || i == j || amount_in <= ZERO {
            return Ok(None);
        }

        let b = liquidity_depth(kappa, inventory)?;
        let delta = div(sub(inventory[i], inventory[j])?, b)?;
        if delta.abs() > MAX_DELTA {
            trace!(delta = %delta, "Fast path: pool not near parity");
            return Ok(None);
        }

        let mut a = amount_in;
        let mut u = div(a, b)?;
        if u <= ZERO || u > MAX_TRADE_FRACTION {
            trace!(u = %u, "Fast path: trade fraction out of range");
            return Ok(None);
        }

        let mut limit_error = ZERO;
        if let Some(limit) = limit_price {
            let r0 = exp_cubic(delta)?;
            if limit <= r0 {
                return Ok(None);
            }
            let t = sub(div(limit, r0)?, ONE)?;
            if t <= LIMIT_MARGIN || t > MAX_LIMIT_MOVE {
                trace!(limit_move = %t, "Fast path: limit outside approximation range");
                return Ok(None);
            }
            let ln_t = ln_cubic(t)?;
            let a_limit = mul(b, ln_t)?;
            if a_limit < a {
                a = a_limit;
                u = div(a, b)?;
                if u <= ZERO {
                    return Ok(None);
                }
            }
            // Exp tail δ⁴/24 and ln tail t⁴/4 are absolute errors in ln(L/r0)
            let absolute = add(div_int(mul(cube(t)?, t)?, 4)?, div_int(mul(cube(delta)?, delta)?, 24)?)?;
            limit_error = div(absolute, ln_t)?;
        }

        // X = u·(1+δ) - u²/2
        let u2 = mul(u, u)?;
        let x = sub(mul(u, add(ONE, delta)?)?, mul(u2, HALF)?)?;
        let x2 = mul(x, x)?;
        let x3 = mul(x2, x)?;
        let (ln_approx, tail) = if u <= QUADRATIC_TIER_LIMIT {
            (sub(x, mul(x2, HALF)?)?, div_int(x3, 3)?)
        } else {
            (
                add(sub(x, mul(x2, HALF)?)?, div_int(x3, 3)?)?,
                div_int(mul(x3, x)?, 4)?,
            )
        };
        if ln_approx <= ZERO {
            return Ok(None);
        }

        let amount_out = mul(b, ln_approx)?;
        if amount_out <= ZERO || amount_out > inventory[j] {
            return Ok(None);
        }

        // Dropped terms of X: u³/6, u²·δ/2, u·δ²/2
        let x_error = add(
            add(div_int(mul(u2, u)?, 6)?, mul(mul(u2, delta.abs())?, HALF)?)?,
            mul(mul(u, mul(delta, delta)?)?, HALF)?,
        )?;
        let relative_error = add(div(add(x_error, tail)?, ln_approx)?, limit_error)?;
        if relative_error > self.max_relative_error {
            trace!(error = %relative_error, "Fast path: error budget exceeded");
            return Ok(None);
        }

        Ok(Some(SwapQuote {
            amount_in: a,
            amount_out,
        }))
    }
}

fn cube(x: Fixed) -> Result<Fixed> {
    mul(mul(x, x)?, x)
}

/// e^d ≈ 1 + d + d²/2 + d³/6
fn exp_cubic(d: Fixed) -> Result<Fixed> {
    let d2 = mul(d, d)?;
    add(add(add(ONE, d)?, mul(d2, HALF)?)?, div_int(mul(d2, d)?, 6)?)
}

/// ln(1+t) ≈ t - t²/2 + t³/3
fn ln_cubic(t: Fixed) -> Result<Fixed> {
    let t2 = mul(t, t)?;
    add(sub(t, mul(t2, HALF)?)?, div_int(mul(t2, t)?, 3)?)
}
