//! Size metric, liquidity depth and the LMSR cost function
//!
//! All functions are pure over an inventory snapshot; nothing here caches.

use crate::error::{LmsrError, Result};
use crate::fixed_math::{self, add, div, mul, sub, Fixed, ONE, ZERO};

/// S(q) = Σ qᵢ
pub fn size_metric(inventory: &[Fixed]) -> Result<Fixed> {
    inventory.iter().try_fold(ZERO, |acc, &q| add(acc, q))
}

/// b = κ·S(q); fails when the size metric is not positive
pub fn liquidity_depth(kappa: Fixed, inventory: &[Fixed]) -> Result<Fixed> {
    let size = size_metric(inventory)?;
    if size <= ZERO {
        return Err(LmsrError::NonPositiveSize(size));
    }
    let b = mul(kappa, size)?;
    if b <= ZERO {
        return Err(LmsrError::NonPositiveKappa(kappa));
    }
    Ok(b)
}

/// C(q) = b·ln Σ exp(qᵢ/b), evaluated as b·(M + ln Z) with a recentering
/// running maximum so every exponent argument stays at or below zero.
pub fn cost(kappa: Fixed, inventory: &[Fixed]) -> Result<Fixed> {
    let b = liquidity_depth(kappa, inventory)?;

    let mut max: Option<Fixed> = None;
    let mut z = ZERO;
    for &q in inventory {
        let y = div(q, b)?;
        match max {
            None => {
                max = Some(y);
                z = ONE;
            }
            Some(m) if y > m => {
                // Z <- Z·exp(M_old - M_new) + 1
                z = add(mul(z, fixed_math::exp(sub(m, y)?)?)?, ONE)?;
                max = Some(y);
            }
            Some(m) => {
                z = add(z, fixed_math::exp(sub(y, m)?)?)?;
            }
        }
    }

    let m = max.ok_or(LmsrError::NonPositiveSize(ZERO))?;
    mul(b, add(m, fixed_math::ln(z)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(v: f64) -> Fixed {
        Fixed::from_num(v)
    }

    #[test]
    fn test_size_and_depth() {
        let q = [fx(100.0), fx(250.0), fx(650.0)];
        assert_eq!(size_metric(&q).unwrap(), fx(1000.0));
        assert_eq!(liquidity_depth(fx(0.5), &q).unwrap(), fx(500.0));
    }

    #[test]
    fn test_depth_rejects_empty_pool() {
        let q = [ZERO, ZERO];
        assert!(matches!(
            liquidity_depth(ONE, &q),
            Err(LmsrError::NonPositiveSize(_))
        ));
    }

    #[test]
    fn test_cost_balanced_pool() {
        // C = b·(q/b + ln n) for n equal entries
        let q = [fx(1000.0); 3];
        let kappa = fx(0.2);
        let b = 600.0;
        let expected = b * (1000.0 / b + 3f64.ln());
        let c = cost(kappa, &q).unwrap().to_num::<f64>();
        assert!((c - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_cost_matches_naive_sum() {
        let q = [fx(10.0), fx(40.0), fx(25.0), fx(5.0)];
        let kappa = fx(0.25);
        let b = 20.0;
        let naive: f64 = b * [10.0f64, 40.0, 25.0, 5.0]
            .iter()
            .map(|x| (x / b).exp())
            .sum::<f64>()
            .ln();
        let c = cost(kappa, &q).unwrap().to_num::<f64>();
        assert!((c - naive).abs() / naive < 1e-12);
    }

    #[test]
    fn test_cost_recentering_handles_wide_spread() {
        // y = q/b spans ~[0, 31]; a naive Σexp would still fit, but the
        // recentered accumulator must agree with the closed form
        let q = [fx(0.001), fx(31.0)];
        let kappa = fx(1.0 / 31.001);
        let c = cost(kappa, &q).unwrap().to_num::<f64>();
        let b = 1.0;
        let expected = b * ((0.001f64 / b).exp() + (31.0f64 / b).exp()).ln();
        assert!((c - expected).abs() / expected < 1e-9);
    }
}
