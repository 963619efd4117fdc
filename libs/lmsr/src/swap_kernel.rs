//! Closed-form pairwise LMSR swaps
//!
//! For input asset i and output asset j with r0 = exp((qᵢ - q_j)/b):
//!
//! ```text
//! amount_out = b·ln(1 + r0·(1 - exp(-a/b)))
//! a          = b·ln(r0 / (r0 + 1 - exp(amount_out/b)))   (inverse)
//! ```
//!
//! Every function takes the inventory snapshot explicitly so the multi-asset
//! solvers can run the kernel against local, not-yet-committed inventories.

use crate::cost::liquidity_depth;
use crate::error::{LmsrError, Result};
use crate::fixed_math::{add, div, exp, ln, mul, sub, Fixed, ONE, ZERO};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Input consumed and output produced by a swap, in internal units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_in: Fixed,
    pub amount_out: Fixed,
}

/// Exact LMSR pairwise swap math
pub struct SwapKernel;

impl SwapKernel {
    /// Validate that `i` and `j` are distinct indices into `inventory`
    pub fn check_pair(inventory: &[Fixed], i: usize, j: usize) -> Result<()> {
        let n_assets = inventory.len();
        for index in [i, j] {
            if index >= n_assets {
                return Err(LmsrError::InvalidAssetIndex { index, n_assets });
            }
        }
        if i == j {
            return Err(LmsrError::SameAsset(i));
        }
        Ok(())
    }

    /// r0 = exp((qᵢ - q_j)/b): units of j paid per unit of i at the margin
    pub fn marginal_rate(b: Fixed, q_in: Fixed, q_out: Fixed) -> Result<Fixed> {
        exp(div(sub(q_in, q_out)?, b)?)
    }

    /// amount_out = b·ln(1 + r0·(1 - exp(-a/b)))
    ///
    /// A non-positive `ln` argument can only come from rounding at the edge of
    /// the domain; the output is then capped to `balance_out`.
    pub fn output_for_input(b: Fixed, r0: Fixed, a: Fixed, balance_out: Fixed) -> Result<Fixed> {
        let u = div(a, b)?;
        let decay = exp(-u)?;
        let arg = add(ONE, mul(r0, sub(ONE, decay)?)?)?;
        if arg <= ZERO {
            debug!(arg = %arg, "Non-positive ln argument, capping output to balance");
            return Ok(balance_out);
        }
        mul(b, ln(arg)?)
    }

    /// a = b·ln(r0 / (r0 + 1 - exp(y/b))), the input that yields output `y`
    pub fn input_for_output(b: Fixed, r0: Fixed, amount_out: Fixed) -> Result<Fixed> {
        let growth = exp(div(amount_out, b)?)?;
        let denominator = sub(add(r0, ONE)?, growth)?;
        if denominator <= ZERO {
            return Err(LmsrError::UnreachableOutput(amount_out));
        }
        mul(b, ln(div(r0, denominator)?)?)
    }

    /// Quote an exact-input swap of `amount_in` of asset `i` into asset `j`
    ///
    /// With `limit_price`, the trade is truncated to the input that moves the
    /// marginal rate exactly to the limit; a limit at or below the current
    /// rate is rejected.
    pub fn swap_amounts_for_exact_input(
        kappa: Fixed,
        inventory: &[Fixed],
        i: usize,
        j: usize,
        amount_in: Fixed,
        limit_price: Option<Fixed>,
    ) -> Result<SwapQuote> {
        Self::check_pair(inventory, i, j)?;
        if amount_in <= ZERO {
            return Err(LmsrError::NonPositiveAmount(amount_in));
        }

        let b = liquidity_depth(kappa, inventory)?;
        let r0 = Self::marginal_rate(b, inventory[i], inventory[j])?;

        let mut a = amount_in;
        if let Some(limit) = limit_price {
            let a_limit = Self::input_to_reach_limit(b, r0, limit)?;
            if a_limit < a {
                debug!(requested = %a, truncated = %a_limit, "Swap truncated at price limit");
                a = a_limit;
            }
        }
        if a <= ZERO {
            return Err(LmsrError::DegenerateTrade("price limit leaves no input"));
        }

        let amount_out = Self::output_for_input(b, r0, a, inventory[j])?;
        if amount_out <= ZERO {
            return Err(LmsrError::DegenerateTrade("zero output"));
        }

        Ok(SwapQuote {
            amount_in: a,
            amount_out,
        })
    }

    /// Quote the largest swap of `i` into `j` that drives the marginal rate
    /// exactly to `limit_price`
    ///
    /// When that output would exceed the balance of `j`, the output is capped
    /// and the input re-solved through the inverse formula; if the inversion
    /// degenerates the uncapped input is kept.
    pub fn swap_amounts_for_price_limit(
        kappa: Fixed,
        inventory: &[Fixed],
        i: usize,
        j: usize,
        limit_price: Fixed,
    ) -> Result<SwapQuote> {
        Self::check_pair(inventory, i, j)?;

        let b = liquidity_depth(kappa, inventory)?;
        let r0 = Self::marginal_rate(b, inventory[i], inventory[j])?;
        let a_limit = Self::input_to_reach_limit(b, r0, limit_price)?;
        if a_limit <= ZERO {
            return Err(LmsrError::DegenerateTrade("limit too close to current price"));
        }

        let amount_out = Self::output_for_input(b, r0, a_limit, inventory[j])?;
        let balance_out = inventory[j];
        if amount_out <= balance_out {
            if amount_out <= ZERO {
                return Err(LmsrError::DegenerateTrade("zero output"));
            }
            return Ok(SwapQuote {
                amount_in: a_limit,
                amount_out,
            });
        }

        if balance_out <= ZERO {
            return Err(LmsrError::DegenerateTrade("output asset has no inventory"));
        }
        let amount_in = match Self::input_for_output(b, r0, balance_out) {
            Ok(a) if a > ZERO => a,
            _ => {
                debug!(input = %a_limit, "Capped inversion degenerate, keeping uncapped input");
                a_limit
            }
        };
        debug!(output = %amount_out, capped = %balance_out, "Limit swap output capped to balance");
        Ok(SwapQuote {
            amount_in,
            amount_out: balance_out,
        })
    }

    /// aLimit = b·ln(L/r0); rejects `L <= r0`
    fn input_to_reach_limit(b: Fixed, r0: Fixed, limit: Fixed) -> Result<Fixed> {
        if limit <= r0 {
            return Err(LmsrError::LimitAtOrBelowPrice { limit, price: r0 });
        }
        mul(b, ln(div(limit, r0)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(v: f64) -> Fixed {
        Fixed::from_num(v)
    }

    fn balanced(n: usize, q: f64) -> Vec<Fixed> {
        vec![fx(q); n]
    }

    #[test]
    fn test_exact_input_matches_closed_form() {
        let q = balanced(2, 1000.0);
        let kappa = fx(0.5); // b = 1000
        let quote = SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, fx(10.0), None).unwrap();

        let expected = 1000.0 * (1.0 + (1.0 - (-0.01f64).exp())).ln();
        let out = quote.amount_out.to_num::<f64>();
        assert_eq!(quote.amount_in, fx(10.0));
        assert!((out - expected).abs() / expected < 1e-12);
        // Output is below input in a balanced pool
        assert!(out < 10.0);
    }

    #[test]
    fn test_marginal_rate_direction() {
        // More of the input asset in the pool yields more output per unit
        let q = vec![fx(1200.0), fx(800.0)];
        let b = fx(1000.0);
        let r0 = SwapKernel::marginal_rate(b, q[0], q[1]).unwrap().to_num::<f64>();
        assert!((r0 - 0.4f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_recovers_input() {
        let b = fx(1000.0);
        let r0 = fx(1.1);
        let a = fx(37.5);
        let out = SwapKernel::output_for_input(b, r0, a, fx(1e9)).unwrap();
        let back = SwapKernel::input_for_output(b, r0, out).unwrap();
        assert!((back - a).abs() < fx(1e-9));
    }

    #[test]
    fn test_inverse_unreachable_output() {
        // exp(y/b) >= r0 + 1 cannot be produced by any input
        let b = fx(100.0);
        let r0 = ONE;
        let err = SwapKernel::input_for_output(b, r0, fx(80.0)).unwrap_err();
        assert!(matches!(err, LmsrError::UnreachableOutput(_)));
    }

    #[test]
    fn test_invalid_pairs() {
        let q = balanced(3, 100.0);
        let kappa = ONE;
        assert_eq!(
            SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 3, ONE, None),
            Err(LmsrError::InvalidAssetIndex { index: 3, n_assets: 3 })
        );
        assert_eq!(
            SwapKernel::swap_amounts_for_exact_input(kappa, &q, 1, 1, ONE, None),
            Err(LmsrError::SameAsset(1))
        );
        assert!(matches!(
            SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, ZERO, None),
            Err(LmsrError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn test_limit_at_current_price_rejected() {
        let q = balanced(2, 1000.0);
        let result = SwapKernel::swap_amounts_for_exact_input(fx(0.5), &q, 0, 1, fx(10.0), Some(ONE));
        assert!(matches!(result, Err(LmsrError::LimitAtOrBelowPrice { .. })));
        let below = SwapKernel::swap_amounts_for_exact_input(fx(0.5), &q, 0, 1, fx(10.0), Some(fx(0.9)));
        assert!(matches!(below, Err(LmsrError::LimitAtOrBelowPrice { .. })));
    }

    #[test]
    fn test_limit_truncates_trade() {
        let q = balanced(2, 1000.0);
        let kappa = fx(0.5); // b = 1000
        let limit = fx(1.001);
        let free = SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, fx(10.0), None).unwrap();
        let limited =
            SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, fx(10.0), Some(limit)).unwrap();

        let expected_in = 1000.0 * 1.001f64.ln();
        assert!((limited.amount_in.to_num::<f64>() - expected_in).abs() < 1e-9);
        assert!(limited.amount_in < free.amount_in);
        assert!(limited.amount_out < free.amount_out);

        // A loose limit leaves the trade untouched
        let loose = SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, fx(10.0), Some(fx(2.0))).unwrap();
        assert_eq!(loose, free);
    }

    #[test]
    fn test_exponent_domain_violation() {
        let q = balanced(2, 1.0);
        let kappa = fx(0.5); // b = 1
        let result = SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, fx(40.0), None);
        assert!(matches!(result, Err(LmsrError::ExpDomain(_))));
    }

    #[test]
    fn test_price_limit_max() {
        let q = balanced(2, 1000.0);
        let kappa = fx(0.5);
        let limit = fx(1.01);
        let quote = SwapKernel::swap_amounts_for_price_limit(kappa, &q, 0, 1, limit).unwrap();
        let expected_in = 1000.0 * 1.01f64.ln();
        assert!((quote.amount_in.to_num::<f64>() - expected_in).abs() < 1e-9);

        // Same trade through the exact-input entry point
        let same = SwapKernel::swap_amounts_for_exact_input(kappa, &q, 0, 1, quote.amount_in, None).unwrap();
        assert_eq!(same.amount_out, quote.amount_out);
    }

    #[test]
    fn test_price_limit_max_caps_to_balance() {
        // Thin output side: the limit is far away, output must be capped
        let q = vec![fx(1000.0), fx(5.0)];
        let kappa = fx(1.0); // b = 1005
        let quote = SwapKernel::swap_amounts_for_price_limit(kappa, &q, 0, 1, fx(100.0)).unwrap();
        assert_eq!(quote.amount_out, fx(5.0));

        let b = fx(1005.0);
        let r0 = SwapKernel::marginal_rate(b, q[0], q[1]).unwrap();
        let out = SwapKernel::output_for_input(b, r0, quote.amount_in, fx(1e9)).unwrap();
        assert!((out - fx(5.0)).abs() < fx(1e-9));
    }
}
