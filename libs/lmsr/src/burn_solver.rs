//! Single-asset withdrawal simulator
//!
//! Redeeming a share α into asset i pays α·qᵢ directly, then converts every
//! other asset's share α·q_j into i by simulating swaps j→i one after the
//! other against the shrinking local inventory (1-α)·q.
//!
//! A share too large for `exp(-a/b)` saturates at `b·ln(1 + r0)` and is then
//! capped at the target balance, so payouts keep growing with α. An asset
//! whose marginal rate itself leaves the exponent domain contributes nothing
//! instead of failing the whole withdrawal; payouts are not monotone in α
//! across such a boundary.

use crate::cost::{liquidity_depth, size_metric};
use crate::error::{LmsrError, Result};
use crate::fixed_math::{add, div, ln, mul, sub, Fixed, EXP_LIMIT, ONE, ZERO};
use crate::swap_kernel::{SwapKernel, SwapQuote};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of a single-asset withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnQuote {
    /// Size metric redeemed, α·S
    pub size_redeemed: Fixed,
    /// Total payout in the target asset
    pub amount_out: Fixed,
    /// Local inventory after the simulated swaps, ready to commit
    pub inventory_after: Vec<Fixed>,
}

/// Sequential-swap withdrawal simulator
pub struct BurnSolver;

impl BurnSolver {
    pub fn quote_burn(kappa: Fixed, inventory: &[Fixed], i: usize, alpha: Fixed) -> Result<BurnQuote> {
        if alpha <= ZERO || alpha > ONE {
            return Err(LmsrError::InvalidAlpha(alpha));
        }
        let n_assets = inventory.len();
        if i >= n_assets {
            return Err(LmsrError::InvalidAssetIndex { index: i, n_assets });
        }

        let size = size_metric(inventory)?;
        let keep = sub(ONE, alpha)?;
        let mut local = inventory
            .iter()
            .map(|&q| mul(q, keep))
            .collect::<Result<Vec<_>>>()?;

        let mut payout = mul(alpha, inventory[i])?;
        for (j, &q_j) in inventory.iter().enumerate() {
            if j == i {
                continue;
            }
            if local[i] <= ZERO {
                debug!(asset = j, "Target asset exhausted, remaining shares contribute nothing");
                break;
            }
            let share = mul(alpha, q_j)?;
            if share <= ZERO {
                continue;
            }
            match Self::simulate_swap(kappa, &local, j, i, share) {
                Ok(quote) => {
                    local[j] = add(local[j], quote.amount_in)?;
                    local[i] = sub(local[i], quote.amount_out)?.max(ZERO);
                    payout = add(payout, quote.amount_out)?;
                }
                Err(err) => {
                    warn!(asset = j, error = %err, "Share conversion failed, asset contributes zero");
                }
            }
        }

        if payout <= ZERO {
            return Err(LmsrError::DegenerateTrade("withdrawal pays nothing"));
        }

        Ok(BurnQuote {
            size_redeemed: mul(alpha, size)?,
            amount_out: payout,
            inventory_after: local,
        })
    }

    /// Swap `amount` of `from` into `to` on the local inventory, capping the
    /// output at the remaining balance of `to`
    fn simulate_swap(
        kappa: Fixed,
        local: &[Fixed],
        from: usize,
        to: usize,
        amount: Fixed,
    ) -> Result<SwapQuote> {
        let b = liquidity_depth(kappa, local)?;
        let r0 = SwapKernel::marginal_rate(b, local[from], local[to])?;
        let balance = local[to];
        let amount_out = if div(amount, b)? >= EXP_LIMIT {
            // e^-u is below e^-32; the output saturates at b·ln(1 + r0)
            mul(b, ln(add(ONE, r0)?)?)?
        } else {
            SwapKernel::output_for_input(b, r0, amount, balance)?
        };
        if amount_out <= balance {
            return Ok(SwapQuote {
                amount_in: amount,
                amount_out,
            });
        }

        let amount_in = match SwapKernel::input_for_output(b, r0, balance) {
            Ok(a) if a > ZERO => a,
            _ => amount,
        };
        debug!(asset = from, capped = %balance, "Share conversion capped at target balance");
        Ok(SwapQuote {
            amount_in,
            amount_out: balance,
        })
    }
}
