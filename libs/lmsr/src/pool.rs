//! Custody layer over the pricing state
//!
//! Owns what the engine does not: per-asset base denominators, external
//! balances, the fee schedule, LP supply, the protocol-fee ledger and the
//! kill flag. Every operation is planned against the current snapshot first
//! and committed only when every fallible step has succeeded, so a failed
//! call leaves the pool untouched. `&mut self` on the committing methods
//! gives each mutation exclusive access for its whole duration.

use crate::error::{LmsrError, PoolError, PoolResult};
use crate::fast_path::{BalancedPairFastPath, FastSwapQuote, QuotePath};
use crate::fixed_math::{add, decimal_to_fixed, mul, sub, Fixed, ZERO};
use crate::kappa::kappa_from_slippage;
use crate::rounding::{
    fee_ceil, gross_up, mul_fixed_floor, pair_fee_pips, ratio_ceil, ratio_floor, share_of,
    to_external_ceil, to_external_floor, to_internal, FEE_DENOMINATOR,
};
use crate::state::LmsrState;
use crate::swap_kernel::SwapKernel;
use lmsr_config::PoolConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// LP tokens per unit of size metric unless configured otherwise
pub const DEFAULT_LP_UNIT: u64 = 1_000_000_000_000_000_000;

/// Static pool parameters
#[derive(Debug, Clone)]
pub struct PoolParams {
    pub kappa: Fixed,
    /// Per-asset swap fee in pips, one entry per asset
    pub fee_pips: Vec<u32>,
    /// Protocol's cut of every collected fee, in pips of the fee
    pub protocol_fee_share_pips: u32,
    pub lp_unit: u64,
    /// Balanced-pair approximation for two-asset pools
    pub fast_path: Option<BalancedPairFastPath>,
}

impl PoolParams {
    pub fn new(kappa: Fixed, fee_pips: Vec<u32>) -> Self {
        Self {
            kappa,
            fee_pips,
            protocol_fee_share_pips: 0,
            lp_unit: DEFAULT_LP_UNIT,
            fast_path: None,
        }
    }

    pub fn with_protocol_fee_share(mut self, share_pips: u32) -> Self {
        self.protocol_fee_share_pips = share_pips;
        self
    }

    pub fn with_lp_unit(mut self, lp_unit: u64) -> Self {
        self.lp_unit = lp_unit;
        self
    }

    pub fn with_fast_path(mut self, fast_path: BalancedPairFastPath) -> Self {
        self.fast_path = Some(fast_path);
        self
    }

    pub fn n_assets(&self) -> usize {
        self.fee_pips.len()
    }

    fn validate(&self) -> PoolResult<()> {
        if self.fee_pips.len() < 2 {
            return Err(LmsrError::TooFewAssets(self.fee_pips.len()).into());
        }
        if self.kappa <= ZERO {
            return Err(LmsrError::NonPositiveKappa(self.kappa).into());
        }
        let mut fees = self.fee_pips.clone();
        fees.sort_unstable_by(|a, b| b.cmp(a));
        pair_fee_pips(fees[0], fees[1])?;
        if self.protocol_fee_share_pips as u128 > FEE_DENOMINATOR {
            return Err(PoolError::InvalidConfig(format!(
                "protocol fee share {} pips exceeds 100%",
                self.protocol_fee_share_pips
            )));
        }
        if self.lp_unit == 0 {
            return Err(PoolError::InvalidConfig("lp_unit must be positive".to_string()));
        }
        Ok(())
    }
}

impl TryFrom<&PoolConfig> for PoolParams {
    type Error = PoolError;

    fn try_from(config: &PoolConfig) -> PoolResult<Self> {
        let n_assets = config.assets.len();
        let kappa = match config.pool.kappa {
            Some(kappa) => decimal_to_fixed(kappa)?,
            None => kappa_from_slippage(
                n_assets,
                decimal_to_fixed(config.pool.trade_fraction)?,
                decimal_to_fixed(config.pool.target_slippage)?,
            )?,
        };

        let params = Self {
            kappa,
            fee_pips: config.fee_schedule(),
            protocol_fee_share_pips: config.pool.protocol_fee_share_pips,
            lp_unit: config.pool.lp_unit,
            fast_path: config.solver.fast_path.then(BalancedPairFastPath::default),
        };
        params.validate()?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapReceipt {
    pub asset_in: usize,
    pub asset_out: usize,
    /// Gross input charged, fee included
    pub amount_in: u128,
    pub fee: u128,
    pub amount_out: u128,
    pub path: QuotePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub asset: usize,
    /// Gross input charged, fee included
    pub amount_in: u128,
    pub fee: u128,
    pub lp_minted: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BurnReceipt {
    pub asset: usize,
    pub lp_burned: u128,
    pub amount_out: u128,
}

/// All-asset deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProportionalReceipt {
    pub lp: u128,
    pub amounts: Vec<u128>,
}

/// Persisted layout: pricing state plus base denominators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub state: LmsrState,
    pub bases: Vec<u64>,
}

struct SwapPlan {
    receipt: SwapReceipt,
    internal_in: Fixed,
    internal_out: Fixed,
    protocol_fee: u128,
}

struct MintPlan {
    receipt: MintReceipt,
    inventory: Vec<Fixed>,
    protocol_fee: u128,
}

struct BurnPlan {
    receipt: BurnReceipt,
    inventory: Vec<Fixed>,
}

struct ProportionalPlan {
    receipt: ProportionalReceipt,
    inventory: Vec<Fixed>,
}

/// Multi-asset LMSR pool with external custody accounting
#[derive(Debug, Clone)]
pub struct Pool {
    params: PoolParams,
    state: LmsrState,
    bases: Vec<u64>,
    balances: Vec<u128>,
    protocol_fees: Vec<u128>,
    lp_supply: u128,
    killed: bool,
}

impl Pool {
    pub fn new(params: PoolParams) -> PoolResult<Self> {
        params.validate()?;
        let n_assets = params.n_assets();
        Ok(Self {
            params,
            state: LmsrState::new(),
            bases: Vec::new(),
            balances: vec![0; n_assets],
            protocol_fees: vec![0; n_assets],
            lp_supply: 0,
            killed: false,
        })
    }

    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        Self::new(PoolParams::try_from(config)?)
    }

    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    pub fn state(&self) -> &LmsrState {
        &self.state
    }

    pub fn n_assets(&self) -> usize {
        self.params.n_assets()
    }

    pub fn bases(&self) -> &[u64] {
        &self.bases
    }

    pub fn balances(&self) -> &[u128] {
        &self.balances
    }

    pub fn protocol_fees(&self) -> &[u128] {
        &self.protocol_fees
    }

    pub fn lp_supply(&self) -> u128 {
        self.lp_supply
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            state: self.state.clone(),
            bases: self.bases.clone(),
        }
    }

    /// Marginal price of j in units of i
    pub fn price(&self, i: usize, j: usize) -> PoolResult<Fixed> {
        Ok(self.state.price(i, j)?)
    }

    /// Seed the pool; returns the LP minted to the depositor
    ///
    /// The first initialisation fixes every asset's base denominator to its
    /// deposit, so each asset enters at internal 1.0. Later
    /// re-initialisations after a full withdrawal reuse those bases.
    pub fn initialize(&mut self, deposits: &[u128]) -> PoolResult<u128> {
        if self.killed {
            return Err(PoolError::Killed);
        }
        if self.state.is_initialized() {
            return Err(LmsrError::AlreadyInitialized.into());
        }
        let n_assets = self.n_assets();
        if deposits.len() != n_assets {
            return Err(PoolError::WrongAssetCount {
                expected: n_assets,
                actual: deposits.len(),
            });
        }
        if let Some(index) = deposits.iter().position(|&d| d == 0) {
            return Err(PoolError::ZeroDeposit(index));
        }

        let bases = if self.bases.is_empty() {
            deposits
                .iter()
                .map(|&d| u64::try_from(d).map_err(|_| LmsrError::Overflow))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            self.bases.clone()
        };
        let inventory = deposits
            .iter()
            .zip(&bases)
            .map(|(&d, &base)| to_internal(d, base))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = LmsrState::new();
        state.initialize(self.params.kappa, inventory)?;
        let lp_minted = mul_fixed_floor(state.size()?, self.params.lp_unit as u128)?;
        if lp_minted == 0 {
            return Err(LmsrError::DegenerateTrade("initial deposit mints no LP").into());
        }
        let balances = self
            .balances
            .iter()
            .zip(deposits)
            .map(|(&b, &d)| b.checked_add(d).ok_or(LmsrError::Overflow))
            .collect::<Result<Vec<_>, _>>()?;

        info!(n_assets, lp_minted, "Pool initialized");
        self.state = state;
        self.bases = bases;
        self.balances = balances;
        self.lp_supply = lp_minted;
        Ok(lp_minted)
    }

    /// Permanently disable swaps and deposits; withdrawals stay open
    pub fn kill(&mut self) {
        if !self.killed {
            warn!("Pool killed, swaps and deposits disabled");
        }
        self.killed = true;
    }

    /// Drain the protocol-fee ledger
    pub fn collect_protocol_fees(&mut self) -> Vec<u128> {
        let n_assets = self.n_assets();
        let collected = std::mem::replace(&mut self.protocol_fees, vec![0; n_assets]);
        info!(?collected, "Protocol fees collected");
        collected
    }

    pub fn quote_swap(
        &self,
        i: usize,
        j: usize,
        gross_in: u128,
        limit_price: Option<Fixed>,
    ) -> PoolResult<SwapReceipt> {
        Ok(self.plan_swap(i, j, gross_in, limit_price)?.receipt)
    }

    /// Exact-input swap of `gross_in` (fee included) of asset `i` into `j`
    ///
    /// With a price limit the trade may be truncated; only the input actually
    /// consumed, grossed up by the fee, is charged.
    pub fn swap(
        &mut self,
        i: usize,
        j: usize,
        gross_in: u128,
        limit_price: Option<Fixed>,
        min_out: u128,
    ) -> PoolResult<SwapReceipt> {
        let plan = self.plan_swap(i, j, gross_in, limit_price)?;
        if plan.receipt.amount_out < min_out {
            return Err(PoolError::SlippageExceeded {
                minimum: min_out,
                actual: plan.receipt.amount_out,
            });
        }
        self.commit_swap(plan)
    }

    pub fn quote_swap_to_limit(&self, i: usize, j: usize, limit_price: Fixed) -> PoolResult<SwapReceipt> {
        Ok(self.plan_swap_to_limit(i, j, limit_price)?.receipt)
    }

    /// Largest swap of `i` into `j` that moves the marginal rate to `limit_price`
    pub fn swap_to_limit(
        &mut self,
        i: usize,
        j: usize,
        limit_price: Fixed,
        max_in: u128,
    ) -> PoolResult<SwapReceipt> {
        let plan = self.plan_swap_to_limit(i, j, limit_price)?;
        if plan.receipt.amount_in > max_in {
            return Err(PoolError::InputAboveMaximum {
                maximum: max_in,
                actual: plan.receipt.amount_in,
            });
        }
        self.commit_swap(plan)
    }

    pub fn quote_mint_single(&self, i: usize, gross_in: u128) -> PoolResult<MintReceipt> {
        Ok(self.plan_mint_single(i, gross_in)?.receipt)
    }

    /// Deposit a single asset for LP
    pub fn mint_single(&mut self, i: usize, gross_in: u128, min_lp: u128) -> PoolResult<MintReceipt> {
        let plan = self.plan_mint_single(i, gross_in)?;
        if plan.receipt.lp_minted < min_lp {
            return Err(PoolError::SlippageExceeded {
                minimum: min_lp,
                actual: plan.receipt.lp_minted,
            });
        }

        let receipt = plan.receipt;
        let pool_in = receipt.amount_in - plan.protocol_fee;
        let balance = self.balances[i].checked_add(pool_in).ok_or(LmsrError::Overflow)?;
        let protocol = self.protocol_fees[i]
            .checked_add(plan.protocol_fee)
            .ok_or(LmsrError::Overflow)?;
        let supply = self.lp_supply.checked_add(receipt.lp_minted).ok_or(LmsrError::Overflow)?;

        self.state.apply_proportional_change(plan.inventory)?;
        self.balances[i] = balance;
        self.protocol_fees[i] = protocol;
        self.lp_supply = supply;
        debug!(asset = i, amount_in = receipt.amount_in, lp = receipt.lp_minted, "Single-asset mint");
        Ok(receipt)
    }

    pub fn quote_burn_single(&self, i: usize, lp: u128) -> PoolResult<BurnReceipt> {
        Ok(self.plan_burn_single(i, lp)?.receipt)
    }

    /// Redeem LP entirely into asset `i`; allowed on a killed pool
    pub fn burn_single(&mut self, i: usize, lp: u128, min_out: u128) -> PoolResult<BurnReceipt> {
        let plan = self.plan_burn_single(i, lp)?;
        let receipt = plan.receipt;
        if receipt.amount_out < min_out {
            return Err(PoolError::SlippageExceeded {
                minimum: min_out,
                actual: receipt.amount_out,
            });
        }

        // Planning capped the payout at the balance and the burn at the supply
        let balance = self.balances[i] - receipt.amount_out;
        let supply = self.lp_supply - receipt.lp_burned;
        self.state.apply_proportional_change(plan.inventory)?;
        self.balances[i] = balance;
        self.lp_supply = supply;
        self.after_withdrawal();
        debug!(asset = i, lp = receipt.lp_burned, amount_out = receipt.amount_out, "Single-asset burn");
        Ok(receipt)
    }

    pub fn quote_mint_proportional(&self, lp: u128) -> PoolResult<ProportionalReceipt> {
        Ok(self.plan_mint_proportional(lp)?.receipt)
    }

    /// Deposit every asset in proportion to buy exactly `lp` LP tokens
    pub fn mint_proportional(&mut self, lp: u128) -> PoolResult<ProportionalReceipt> {
        let plan = self.plan_mint_proportional(lp)?;
        let balances = self
            .balances
            .iter()
            .zip(&plan.receipt.amounts)
            .map(|(&b, &d)| b.checked_add(d).ok_or(LmsrError::Overflow))
            .collect::<Result<Vec<_>, _>>()?;
        let supply = self.lp_supply.checked_add(lp).ok_or(LmsrError::Overflow)?;

        self.state.apply_proportional_change(plan.inventory)?;
        self.balances = balances;
        self.lp_supply = supply;
        debug!(lp, amounts = ?plan.receipt.amounts, "Proportional mint");
        Ok(plan.receipt)
    }

    pub fn quote_burn_proportional(&self, lp: u128) -> PoolResult<ProportionalReceipt> {
        Ok(self.plan_burn_proportional(lp)?.receipt)
    }

    /// Withdraw every asset in proportion; allowed on a killed pool
    pub fn burn_proportional(&mut self, lp: u128) -> PoolResult<ProportionalReceipt> {
        let plan = self.plan_burn_proportional(lp)?;
        let balances = self
            .balances
            .iter()
            .zip(&plan.receipt.amounts)
            .map(|(&b, &w)| b - w)
            .collect::<Vec<_>>();
        let supply = self.lp_supply - lp;

        self.state.apply_proportional_change(plan.inventory)?;
        self.balances = balances;
        self.lp_supply = supply;
        self.after_withdrawal();
        debug!(lp, amounts = ?plan.receipt.amounts, "Proportional burn");
        Ok(plan.receipt)
    }

    fn after_withdrawal(&mut self) {
        if !self.state.is_initialized() {
            info!(residual = ?self.balances, "Last LP withdrew, pool back to uninitialized");
        }
    }

    fn ensure_tradable(&self) -> PoolResult<()> {
        if self.killed {
            return Err(PoolError::Killed);
        }
        if !self.state.is_initialized() {
            return Err(LmsrError::NotInitialized.into());
        }
        Ok(())
    }

    fn check_asset(&self, index: usize) -> PoolResult<()> {
        let n_assets = self.n_assets();
        if index >= n_assets {
            return Err(LmsrError::InvalidAssetIndex { index, n_assets }.into());
        }
        Ok(())
    }

    fn check_lp(&self, lp: u128) -> PoolResult<()> {
        if !self.state.is_initialized() {
            return Err(LmsrError::NotInitialized.into());
        }
        if lp == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if lp > self.lp_supply {
            return Err(PoolError::InsufficientLpSupply {
                requested: lp,
                supply: self.lp_supply,
            });
        }
        Ok(())
    }

    fn quote_internal_swap(
        &self,
        i: usize,
        j: usize,
        amount_in: Fixed,
        limit_price: Option<Fixed>,
    ) -> PoolResult<FastSwapQuote> {
        match &self.params.fast_path {
            Some(fast_path) if self.n_assets() == 2 => {
                Ok(self.state.quote_swap_balanced_pair(fast_path, i, j, amount_in, limit_price)?)
            }
            _ => Ok(FastSwapQuote {
                quote: self.state.quote_swap_exact_input(i, j, amount_in, limit_price)?,
                path: QuotePath::Exact,
            }),
        }
    }

    fn plan_swap(&self, i: usize, j: usize, gross_in: u128, limit_price: Option<Fixed>) -> PoolResult<SwapPlan> {
        self.ensure_tradable()?;
        SwapKernel::check_pair(self.state.inventory(), i, j)?;
        if gross_in == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let fee_pips = pair_fee_pips(self.params.fee_pips[i], self.params.fee_pips[j])?;
        let fee = fee_ceil(gross_in, fee_pips)?;
        let net = gross_in - fee;
        let net_internal = to_internal(net, self.bases[i])?;
        if net_internal <= ZERO {
            return Err(LmsrError::DegenerateTrade("input rounds to zero").into());
        }

        let FastSwapQuote { quote, path } = self.quote_internal_swap(i, j, net_internal, limit_price)?;

        // A truncated trade charges only the consumed input plus its fee
        let (amount_in, fee) = if quote.amount_in < net_internal {
            let consumed = to_external_ceil(quote.amount_in, self.bases[i])?.min(net);
            let gross = gross_up(consumed, fee_pips)?.min(gross_in);
            (gross, gross - consumed)
        } else {
            (gross_in, fee)
        };

        self.finish_swap_plan(i, j, amount_in, fee, quote.amount_in, quote.amount_out, path)
    }

    fn plan_swap_to_limit(&self, i: usize, j: usize, limit_price: Fixed) -> PoolResult<SwapPlan> {
        self.ensure_tradable()?;
        SwapKernel::check_pair(self.state.inventory(), i, j)?;

        let fee_pips = pair_fee_pips(self.params.fee_pips[i], self.params.fee_pips[j])?;
        let quote = self.state.quote_swap_to_price_limit(i, j, limit_price)?;
        let consumed = to_external_ceil(quote.amount_in, self.bases[i])?;
        let gross = gross_up(consumed, fee_pips)?;

        self.finish_swap_plan(
            i,
            j,
            gross,
            gross - consumed,
            quote.amount_in,
            quote.amount_out,
            QuotePath::Exact,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_swap_plan(
        &self,
        i: usize,
        j: usize,
        amount_in: u128,
        fee: u128,
        internal_in: Fixed,
        internal_out: Fixed,
        path: QuotePath,
    ) -> PoolResult<SwapPlan> {
        if amount_in == 0 {
            return Err(LmsrError::DegenerateTrade("input rounds to zero").into());
        }
        let amount_out = to_external_floor(internal_out, self.bases[j])?;
        if amount_out == 0 {
            return Err(LmsrError::DegenerateTrade("output rounds to zero").into());
        }
        if amount_out > self.balances[j] {
            return Err(PoolError::InsufficientBalance {
                asset: j,
                needed: amount_out,
                available: self.balances[j],
            });
        }

        Ok(SwapPlan {
            receipt: SwapReceipt {
                asset_in: i,
                asset_out: j,
                amount_in,
                fee,
                amount_out,
                path,
            },
            internal_in,
            internal_out,
            protocol_fee: share_of(fee, self.params.protocol_fee_share_pips)?,
        })
    }

    fn commit_swap(&mut self, plan: SwapPlan) -> PoolResult<SwapReceipt> {
        let receipt = plan.receipt;
        let (i, j) = (receipt.asset_in, receipt.asset_out);

        let pool_in = receipt.amount_in - plan.protocol_fee;
        let balance_in = self.balances[i].checked_add(pool_in).ok_or(LmsrError::Overflow)?;
        let balance_out = self.balances[j] - receipt.amount_out;
        let protocol = self.protocol_fees[i]
            .checked_add(plan.protocol_fee)
            .ok_or(LmsrError::Overflow)?;

        self.state.apply_swap(i, j, plan.internal_in, plan.internal_out)?;
        self.balances[i] = balance_in;
        self.balances[j] = balance_out;
        self.protocol_fees[i] = protocol;
        debug!(
            asset_in = i,
            asset_out = j,
            amount_in = receipt.amount_in,
            amount_out = receipt.amount_out,
            fee = receipt.fee,
            path = ?receipt.path,
            "Swap committed"
        );
        Ok(receipt)
    }

    fn plan_mint_single(&self, i: usize, gross_in: u128) -> PoolResult<MintPlan> {
        self.ensure_tradable()?;
        self.check_asset(i)?;
        if gross_in == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let fee_pips = self.params.fee_pips[i];
        let fee = fee_ceil(gross_in, fee_pips)?;
        let net = gross_in - fee;
        let net_internal = to_internal(net, self.bases[i])?;
        if net_internal <= ZERO {
            return Err(LmsrError::DegenerateTrade("deposit rounds to zero").into());
        }

        let quote = self.state.quote_mint(i, net_internal)?;
        let consumed = to_external_ceil(quote.amount_in, self.bases[i])?.min(net);
        let (amount_in, fee) = if consumed < net {
            let gross = gross_up(consumed, fee_pips)?.min(gross_in);
            (gross, gross - consumed)
        } else {
            (gross_in, fee)
        };

        let lp_minted = mul_fixed_floor(quote.alpha, self.lp_supply)?;
        if lp_minted == 0 {
            return Err(LmsrError::DegenerateTrade("deposit mints no LP").into());
        }

        let inventory = self
            .state
            .inventory()
            .iter()
            .map(|&q| add(q, mul(q, quote.alpha)?))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MintPlan {
            receipt: MintReceipt {
                asset: i,
                amount_in,
                fee,
                lp_minted,
            },
            inventory,
            protocol_fee: share_of(fee, self.params.protocol_fee_share_pips)?,
        })
    }

    fn plan_burn_single(&self, i: usize, lp: u128) -> PoolResult<BurnPlan> {
        self.check_lp(lp)?;
        self.check_asset(i)?;

        let alpha = ratio_floor(lp, self.lp_supply)?;
        if alpha <= ZERO {
            return Err(LmsrError::DegenerateTrade("burn redeems no size").into());
        }
        let quote = self.state.quote_burn(i, alpha)?;
        let amount_out = to_external_floor(quote.amount_out, self.bases[i])?.min(self.balances[i]);
        if amount_out == 0 {
            return Err(LmsrError::DegenerateTrade("withdrawal rounds to zero").into());
        }

        Ok(BurnPlan {
            receipt: BurnReceipt {
                asset: i,
                lp_burned: lp,
                amount_out,
            },
            inventory: quote.inventory_after,
        })
    }

    fn plan_mint_proportional(&self, lp: u128) -> PoolResult<ProportionalPlan> {
        self.ensure_tradable()?;
        if lp == 0 {
            return Err(PoolError::ZeroAmount);
        }

        // Round the share up so depositors never underpay
        let alpha = ratio_ceil(lp, self.lp_supply)?;
        let mut amounts = Vec::with_capacity(self.n_assets());
        let mut inventory = Vec::with_capacity(self.n_assets());
        for (&q, &base) in self.state.inventory().iter().zip(&self.bases) {
            let delta = mul(q, alpha)?;
            amounts.push(to_external_ceil(delta, base)?);
            inventory.push(add(q, delta)?);
        }

        Ok(ProportionalPlan {
            receipt: ProportionalReceipt { lp, amounts },
            inventory,
        })
    }

    fn plan_burn_proportional(&self, lp: u128) -> PoolResult<ProportionalPlan> {
        self.check_lp(lp)?;

        // The last LP takes every remaining balance, dust included
        if lp == self.lp_supply {
            return Ok(ProportionalPlan {
                receipt: ProportionalReceipt {
                    lp,
                    amounts: self.balances.clone(),
                },
                inventory: vec![ZERO; self.n_assets()],
            });
        }

        let alpha = ratio_floor(lp, self.lp_supply)?;
        let mut amounts = Vec::with_capacity(self.n_assets());
        let mut inventory = Vec::with_capacity(self.n_assets());
        for ((&q, &base), &balance) in self
            .state
            .inventory()
            .iter()
            .zip(&self.bases)
            .zip(&self.balances)
        {
            let delta = mul(q, alpha)?;
            amounts.push(to_external_floor(delta, base)?.min(balance));
            inventory.push(sub(q, delta)?);
        }
        if amounts.iter().all(|&a| a == 0) {
            return Err(LmsrError::DegenerateTrade("withdrawal rounds to zero").into());
        }

        Ok(ProportionalPlan {
            receipt: ProportionalReceipt { lp, amounts },
            inventory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_math::ONE;

    const MILLION: u128 = 1_000_000;
    const LP_UNIT: u64 = 1_000_000;

    fn fx(v: f64) -> Fixed {
        Fixed::from_num(v)
    }

    fn pool(kappa: f64, fees: Vec<u32>, deposits: &[u128]) -> Pool {
        let params = PoolParams::new(fx(kappa), fees).with_lp_unit(LP_UNIT);
        let mut pool = Pool::new(params).unwrap();
        pool.initialize(deposits).unwrap();
        pool
    }

    #[test]
    fn test_initialize_sets_bases_and_lp() {
        let pool = pool(0.5, vec![0, 0, 0], &[MILLION, 2 * MILLION, 500]);
        assert_eq!(pool.bases(), &[1_000_000, 2_000_000, 500]);
        assert!(pool.state().inventory().iter().all(|&q| q == ONE));
        assert_eq!(pool.lp_supply(), 3 * LP_UNIT as u128);
        assert_eq!(pool.balances(), &[MILLION, 2 * MILLION, 500]);
    }

    #[test]
    fn test_initialize_validation() {
        let params = PoolParams::new(ONE, vec![0, 0]);
        let mut pool = Pool::new(params).unwrap();
        assert_eq!(
            pool.initialize(&[1, 2, 3]),
            Err(PoolError::WrongAssetCount { expected: 2, actual: 3 })
        );
        assert_eq!(pool.initialize(&[5, 0]), Err(PoolError::ZeroDeposit(1)));
        pool.initialize(&[5, 5]).unwrap();
        assert_eq!(
            pool.initialize(&[5, 5]),
            Err(PoolError::Engine(LmsrError::AlreadyInitialized))
        );

        assert!(Pool::new(PoolParams::new(ONE, vec![0])).is_err());
        assert!(Pool::new(PoolParams::new(ONE, vec![600_000, 400_000])).is_err());
        assert!(Pool::new(PoolParams::new(ZERO, vec![0, 0])).is_err());
    }

    #[test]
    fn test_swap_charges_additive_fee() {
        let mut pool = pool(1.0, vec![100, 200], &[MILLION, MILLION]);
        let quoted = pool.quote_swap(0, 1, 10_000, None).unwrap();
        let receipt = pool.swap(0, 1, 10_000, None, 0).unwrap();
        assert_eq!(quoted, receipt);

        assert_eq!(receipt.fee, 3);
        assert_eq!(receipt.amount_in, 10_000);
        assert!(receipt.amount_out > 0 && receipt.amount_out < 9_997);
        assert_eq!(receipt.path, QuotePath::Exact);
        assert_eq!(pool.balances()[0], MILLION + 10_000);
        assert_eq!(pool.balances()[1], MILLION - receipt.amount_out);

        let expected_in = to_internal(9_997, 1_000_000).unwrap();
        assert_eq!(pool.state().inventory()[0], ONE + expected_in);
    }

    #[test]
    fn test_failed_swap_leaves_pool_untouched() {
        let mut pool = pool(1.0, vec![0, 0], &[MILLION, MILLION]);
        let before = pool.snapshot();
        let balances = pool.balances().to_vec();

        let err = pool.swap(0, 1, 10_000, None, 10_000).unwrap_err();
        assert!(matches!(err, PoolError::SlippageExceeded { minimum: 10_000, .. }));
        assert_eq!(pool.swap(0, 0, 10, None, 0).unwrap_err(), LmsrError::SameAsset(0).into());
        assert_eq!(pool.swap(0, 1, 0, None, 0).unwrap_err(), PoolError::ZeroAmount);

        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.balances(), balances.as_slice());
    }

    #[test]
    fn test_dust_swap_is_too_small() {
        let mut pool = pool(1.0, vec![0, 0], &[1_000_000_000_000, 1_000_000_000_000]);
        let err = pool.swap(0, 1, 1, None, 0).unwrap_err();
        assert!(err.is_trade_too_small());
    }

    #[test]
    fn test_limit_truncation_grosses_up_fee() {
        let mut pool = pool(1.0, vec![150, 150], &[MILLION, MILLION]);
        let free = pool.quote_swap(0, 1, 100_000, None).unwrap();
        let limit = pool.state().marginal_rate(0, 1).unwrap() * fx(1.001);
        let limited = pool.swap(0, 1, 100_000, Some(limit), 0).unwrap();

        assert!(limited.amount_in < free.amount_in);
        assert!(limited.amount_out < free.amount_out);
        // The charged gross still covers its own fee
        assert!(limited.fee >= fee_ceil(limited.amount_in - limited.fee, 300).unwrap());

        let at_price = pool.state().marginal_rate(0, 1).unwrap();
        assert!(matches!(
            pool.swap(0, 1, 1_000, Some(at_price), 0),
            Err(PoolError::Engine(LmsrError::LimitAtOrBelowPrice { .. }))
        ));
    }

    #[test]
    fn test_swap_to_limit() {
        let mut pool = pool(1.0, vec![0, 0], &[MILLION, MILLION]);
        let limit = fx(1.01);
        let quoted = pool.quote_swap_to_limit(0, 1, limit).unwrap();
        assert!(matches!(
            pool.swap_to_limit(0, 1, limit, quoted.amount_in - 1),
            Err(PoolError::InputAboveMaximum { .. })
        ));
        let receipt = pool.swap_to_limit(0, 1, limit, quoted.amount_in).unwrap();
        assert_eq!(receipt, quoted);
        assert_eq!(pool.balances()[0], MILLION + receipt.amount_in);
        assert!(pool.state().inventory()[0] > ONE);

        let expected_in = 2.0 * 1.01f64.ln() * 1e6;
        assert!((receipt.amount_in as f64 - expected_in).abs() < 2.0);
    }

    #[test]
    fn test_protocol_fee_ledger() {
        let params = PoolParams::new(ONE, vec![500, 500])
            .with_lp_unit(LP_UNIT)
            .with_protocol_fee_share(250_000);
        let mut pool = Pool::new(params).unwrap();
        pool.initialize(&[MILLION, MILLION]).unwrap();

        let receipt = pool.swap(0, 1, 100_000, None, 0).unwrap();
        assert_eq!(receipt.fee, 100);
        assert_eq!(pool.protocol_fees(), &[25, 0]);
        assert_eq!(pool.balances()[0], MILLION + 100_000 - 25);

        assert_eq!(pool.collect_protocol_fees(), vec![25, 0]);
        assert_eq!(pool.protocol_fees(), &[0, 0]);
        assert_eq!(pool.collect_protocol_fees(), vec![0, 0]);

        // The drained ledger keeps one slot per asset and accrues again
        pool.swap(1, 0, 100_000, None, 0).unwrap();
        assert_eq!(pool.protocol_fees(), &[0, 25]);
    }

    #[test]
    fn test_kill_blocks_swaps_and_mints_only() {
        let mut pool = pool(1.0, vec![0, 0, 0], &[MILLION, MILLION, MILLION]);
        pool.kill();
        assert!(pool.is_killed());
        assert_eq!(pool.swap(0, 1, 1_000, None, 0), Err(PoolError::Killed));
        assert_eq!(pool.mint_single(0, 1_000, 0), Err(PoolError::Killed));
        assert_eq!(pool.mint_proportional(1_000), Err(PoolError::Killed));

        let supply = pool.lp_supply();
        let burned = pool.burn_single(2, supply / 10, 0).unwrap();
        assert!(burned.amount_out > 0);
        pool.burn_proportional(pool.lp_supply()).unwrap();
        assert!(!pool.state().is_initialized());
    }

    #[test]
    fn test_single_mint_and_burn() {
        let mut pool = pool(0.5, vec![100, 100, 100], &[MILLION, MILLION, MILLION]);
        let supply = pool.lp_supply();

        let mint = pool.mint_single(1, 30_000, 1).unwrap();
        assert!(mint.amount_in <= 30_000);
        assert!(mint.lp_minted > 0);
        // Buying the other assets through the curve costs more than a proportional deposit
        assert!(mint.lp_minted < supply / 100);
        assert_eq!(pool.lp_supply(), supply + mint.lp_minted);
        assert_eq!(pool.balances()[1], MILLION + mint.amount_in);

        let burn = pool.burn_single(1, mint.lp_minted, 0).unwrap();
        // Round trip through the curve loses value
        assert!(burn.amount_out < mint.amount_in);
        assert_eq!(pool.lp_supply(), supply);
    }

    #[test]
    fn test_burn_min_out_and_supply_checks() {
        let mut pool = pool(0.5, vec![0, 0], &[MILLION, MILLION]);
        let supply = pool.lp_supply();
        assert_eq!(
            pool.burn_single(0, supply + 1, 0),
            Err(PoolError::InsufficientLpSupply {
                requested: supply + 1,
                supply
            })
        );
        assert_eq!(pool.burn_single(0, 0, 0), Err(PoolError::ZeroAmount));
        assert!(matches!(
            pool.burn_single(0, supply / 2, u128::MAX),
            Err(PoolError::SlippageExceeded { .. })
        ));
    }

    #[test]
    fn test_proportional_round_trip_never_gains() {
        let mut pool = pool(0.5, vec![0, 0, 0], &[MILLION, 3 * MILLION, 7]);
        let lp = pool.lp_supply() / 3;
        let deposit = pool.mint_proportional(lp).unwrap();
        let withdrawal = pool.burn_proportional(lp).unwrap();
        for (d, w) in deposit.amounts.iter().zip(&withdrawal.amounts) {
            assert!(w <= d);
        }
        assert_eq!(deposit.amounts[0], MILLION / 3 + 1);
    }

    #[test]
    fn test_full_withdrawal_and_reinitialize() {
        let mut pool = pool(0.5, vec![0, 0], &[MILLION, 4 * MILLION]);
        let swap = pool.swap(0, 1, 50_000, None, 0).unwrap();

        let out = pool.burn_proportional(pool.lp_supply()).unwrap();
        assert_eq!(out.amounts, vec![MILLION + 50_000, 4 * MILLION - swap.amount_out]);
        assert!(!pool.state().is_initialized());
        assert_eq!(pool.lp_supply(), 0);
        assert_eq!(pool.balances(), &[0, 0]);

        // Bases survive; a half-size deposit enters at 0.5
        pool.initialize(&[MILLION / 2, 2 * MILLION]).unwrap();
        assert_eq!(pool.bases(), &[1_000_000, 4_000_000]);
        assert_eq!(pool.state().inventory(), &[fx(0.5), fx(0.5)]);
    }

    #[test]
    fn test_single_burn_of_everything_deinitializes() {
        let mut pool = pool(0.5, vec![0, 0], &[MILLION, MILLION]);
        let receipt = pool.burn_single(0, pool.lp_supply(), 0).unwrap();
        assert_eq!(receipt.amount_out, MILLION);
        assert!(!pool.state().is_initialized());
        assert_eq!(pool.swap(0, 1, 10, None, 0), Err(LmsrError::NotInitialized.into()));
    }

    #[test]
    fn test_fast_path_for_two_assets() {
        let params = PoolParams::new(ONE, vec![0, 0])
            .with_lp_unit(LP_UNIT)
            .with_fast_path(BalancedPairFastPath::default());
        let mut pool = Pool::new(params).unwrap();
        pool.initialize(&[MILLION, MILLION]).unwrap();

        let small = pool.swap(0, 1, 1_000, None, 0).unwrap();
        assert_eq!(small.path, QuotePath::Approximation);
        let large = pool.swap(0, 1, 200_000, None, 0).unwrap();
        assert_eq!(large.path, QuotePath::Exact);
    }

    #[test]
    fn test_params_from_config() {
        let config = PoolConfig::from_toml_str(
            r#"
[pool]
target_slippage = "0.001"
trade_fraction = "0.01"
lp_unit = 1000

[[assets]]
symbol = "A"
fee_pips = 30

[[assets]]
symbol = "B"
fee_pips = 50

[[assets]]
symbol = "C"

[solver]
fast_path = true
"#,
        )
        .unwrap();
        let params = PoolParams::try_from(&config).unwrap();
        assert_eq!(params.fee_pips, vec![30, 50, 0]);
        assert_eq!(params.lp_unit, 1000);
        assert!(params.fast_path.is_some());
        let expected = kappa_from_slippage(3, fx(0.01), fx(0.001)).unwrap();
        assert!((params.kappa - expected).abs() < fx(1e-12));

        let pool = Pool::from_config(&config).unwrap();
        assert_eq!(pool.n_assets(), 3);
    }
}
