//! Human-readable quote summaries
//!
//! Converts internal 64.64 results into `Decimal` figures with execution
//! price and slippage against the pre-trade marginal rate.

use crate::burn_solver::BurnQuote;
use crate::error::Result;
use crate::fast_path::{FastSwapQuote, QuotePath};
use crate::fixed_math::{fixed_to_decimal, Fixed};
use crate::mint_solver::MintQuote;
use crate::state::LmsrState;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteKind {
    Swap,
    Mint,
    Burn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteReport {
    pub kind: QuoteKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_in: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_out: Option<usize>,
    /// Swap input, mint input consumed, or size redeemed by a burn
    pub amount_in: Decimal,
    /// Swap output, mint size increase, or burn payout
    pub amount_out: Decimal,
    /// amount_out / amount_in
    pub execution_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal_price: Option<Decimal>,
    /// 1 - execution/marginal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<QuotePath>,
}

impl QuoteReport {
    pub fn swap(state: &LmsrState, i: usize, j: usize, quote: &FastSwapQuote) -> Result<Self> {
        let marginal = fixed_to_decimal(state.marginal_rate(i, j)?);
        let execution = ratio(quote.quote.amount_out, quote.quote.amount_in);
        let slippage = if marginal.is_zero() {
            None
        } else {
            Some(Decimal::ONE - execution / marginal)
        };

        Ok(Self {
            kind: QuoteKind::Swap,
            asset_in: Some(i),
            asset_out: Some(j),
            amount_in: fixed_to_decimal(quote.quote.amount_in),
            amount_out: fixed_to_decimal(quote.quote.amount_out),
            execution_price: execution,
            marginal_price: Some(marginal),
            slippage,
            path: Some(quote.path),
        })
    }

    pub fn mint(i: usize, quote: &MintQuote) -> Self {
        Self {
            kind: QuoteKind::Mint,
            asset_in: Some(i),
            asset_out: None,
            amount_in: fixed_to_decimal(quote.amount_in),
            amount_out: fixed_to_decimal(quote.size_increase),
            execution_price: ratio(quote.size_increase, quote.amount_in),
            marginal_price: None,
            slippage: None,
            path: None,
        }
    }

    pub fn burn(i: usize, quote: &BurnQuote) -> Self {
        Self {
            kind: QuoteKind::Burn,
            asset_in: None,
            asset_out: Some(i),
            amount_in: fixed_to_decimal(quote.size_redeemed),
            amount_out: fixed_to_decimal(quote.amount_out),
            execution_price: ratio(quote.amount_out, quote.size_redeemed),
            marginal_price: None,
            slippage: None,
            path: None,
        }
    }
}

fn ratio(numerator: Fixed, denominator: Fixed) -> Decimal {
    let denominator = fixed_to_decimal(denominator);
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    fixed_to_decimal(numerator) / denominator
}
