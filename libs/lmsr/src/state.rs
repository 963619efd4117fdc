//! Persistent pricing state
//!
//! The only mutable entity of the engine: the liquidity parameter κ and the
//! virtual inventory vector. Depth `b` is re-derived on every read. Quotes are
//! read-only; commits validate everything before writing so a failed commit
//! leaves the state untouched.

use crate::burn_solver::{BurnQuote, BurnSolver};
use crate::cost::{self, liquidity_depth, size_metric};
use crate::error::{LmsrError, Result};
use crate::fast_path::{BalancedPairFastPath, FastSwapQuote};
use crate::fixed_math::{add, div, exp, sub, Fixed, ZERO};
use crate::mint_solver::{MintQuote, MintSolver};
use crate::swap_kernel::{SwapKernel, SwapQuote};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LmsrState {
    kappa: Fixed,
    inventory: Vec<Fixed>,
}

impl LmsrState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uninitialized → Active
    pub fn initialize(&mut self, kappa: Fixed, inventory: Vec<Fixed>) -> Result<()> {
        if self.is_initialized() {
            return Err(LmsrError::AlreadyInitialized);
        }
        if inventory.len() < 2 {
            return Err(LmsrError::TooFewAssets(inventory.len()));
        }
        if kappa <= ZERO {
            return Err(LmsrError::NonPositiveKappa(kappa));
        }
        if let Some(index) = inventory.iter().position(|&q| q < ZERO) {
            return Err(LmsrError::NegativeInventory(index));
        }
        let size = size_metric(&inventory)?;
        if size <= ZERO {
            return Err(LmsrError::NonPositiveSize(size));
        }
        // b must be representable
        liquidity_depth(kappa, &inventory)?;

        info!(n_assets = inventory.len(), kappa = %kappa, size = %size, "Pricing state initialized");
        self.kappa = kappa;
        self.inventory = inventory;
        Ok(())
    }

    /// Active → Uninitialized
    pub fn deinitialize(&mut self) {
        if self.is_initialized() {
            info!(n_assets = self.inventory.len(), "Pricing state deinitialized");
        }
        self.kappa = ZERO;
        self.inventory.clear();
    }

    pub fn is_initialized(&self) -> bool {
        !self.inventory.is_empty()
    }

    pub fn n_assets(&self) -> usize {
        self.inventory.len()
    }

    pub fn kappa(&self) -> Fixed {
        self.kappa
    }

    pub fn inventory(&self) -> &[Fixed] {
        &self.inventory
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(LmsrError::NotInitialized)
        }
    }

    pub fn size(&self) -> Result<Fixed> {
        self.ensure_initialized()?;
        size_metric(&self.inventory)
    }

    /// Liquidity depth b = κ·S
    pub fn b(&self) -> Result<Fixed> {
        self.ensure_initialized()?;
        liquidity_depth(self.kappa, &self.inventory)
    }

    pub fn cost(&self) -> Result<Fixed> {
        self.ensure_initialized()?;
        cost::cost(self.kappa, &self.inventory)
    }

    /// Marginal price of j in units of i: exp((q_j - qᵢ)/b)
    pub fn price(&self, i: usize, j: usize) -> Result<Fixed> {
        self.ensure_initialized()?;
        let n_assets = self.inventory.len();
        for index in [i, j] {
            if index >= n_assets {
                return Err(LmsrError::InvalidAssetIndex { index, n_assets });
            }
        }
        if i == j {
            return Ok(crate::fixed_math::ONE);
        }
        let b = self.b()?;
        exp(div(sub(self.inventory[j], self.inventory[i])?, b)?)
    }

    /// Marginal rate r0 of a swap i→j: units of j per unit of i
    pub fn marginal_rate(&self, i: usize, j: usize) -> Result<Fixed> {
        self.ensure_initialized()?;
        SwapKernel::check_pair(&self.inventory, i, j)?;
        SwapKernel::marginal_rate(self.b()?, self.inventory[i], self.inventory[j])
    }

    pub fn quote_swap_exact_input(
        &self,
        i: usize,
        j: usize,
        amount_in: Fixed,
        limit_price: Option<Fixed>,
    ) -> Result<SwapQuote> {
        self.ensure_initialized()?;
        SwapKernel::swap_amounts_for_exact_input(self.kappa, &self.inventory, i, j, amount_in, limit_price)
    }

    pub fn quote_swap_to_price_limit(&self, i: usize, j: usize, limit_price: Fixed) -> Result<SwapQuote> {
        self.ensure_initialized()?;
        SwapKernel::swap_amounts_for_price_limit(self.kappa, &self.inventory, i, j, limit_price)
    }

    /// Exact-input quote through the balanced-pair approximation when it applies
    pub fn quote_swap_balanced_pair(
        &self,
        fast_path: &BalancedPairFastPath,
        i: usize,
        j: usize,
        amount_in: Fixed,
        limit_price: Option<Fixed>,
    ) -> Result<FastSwapQuote> {
        self.ensure_initialized()?;
        fast_path.quote(self.kappa, &self.inventory, i, j, amount_in, limit_price)
    }

    pub fn quote_mint(&self, i: usize, amount_in: Fixed) -> Result<MintQuote> {
        self.ensure_initialized()?;
        MintSolver::quote_mint(self.kappa, &self.inventory, i, amount_in)
    }

    pub fn quote_burn(&self, i: usize, alpha: Fixed) -> Result<BurnQuote> {
        self.ensure_initialized()?;
        BurnSolver::quote_burn(self.kappa, &self.inventory, i, alpha)
    }

    /// Commit a quoted swap: qᵢ += amount_in, q_j -= amount_out
    pub fn apply_swap(&mut self, i: usize, j: usize, amount_in: Fixed, amount_out: Fixed) -> Result<()> {
        self.ensure_initialized()?;
        SwapKernel::check_pair(&self.inventory, i, j)?;
        for amount in [amount_in, amount_out] {
            if amount < ZERO {
                return Err(LmsrError::NegativeAmount(amount));
            }
        }
        let available = self.inventory[j];
        if amount_out > available {
            return Err(LmsrError::InsufficientInventory {
                index: j,
                needed: amount_out,
                available,
            });
        }

        let new_in = add(self.inventory[i], amount_in)?;
        let new_out = sub(available, amount_out)?;
        // The size metric must stay positive and b representable
        let mut next = self.inventory.clone();
        next[i] = new_in;
        next[j] = new_out;
        liquidity_depth(self.kappa, &next)?;

        debug!(i, j, amount_in = %amount_in, amount_out = %amount_out, "Swap applied");
        self.inventory = next;
        Ok(())
    }

    /// Replace the whole inventory (mint/burn commit). An all-zero inventory
    /// returns the state to Uninitialized.
    pub fn apply_proportional_change(&mut self, new_inventory: Vec<Fixed>) -> Result<()> {
        self.ensure_initialized()?;
        if new_inventory.len() != self.inventory.len() {
            return Err(LmsrError::InventoryLengthMismatch {
                expected: self.inventory.len(),
                actual: new_inventory.len(),
            });
        }
        if let Some(index) = new_inventory.iter().position(|&q| q < ZERO) {
            return Err(LmsrError::NegativeInventory(index));
        }
        if new_inventory.iter().all(|&q| q == ZERO) {
            self.deinitialize();
            return Ok(());
        }
        liquidity_depth(self.kappa, &new_inventory)?;

        debug!(size = %size_metric(&new_inventory)?, "Inventory rewritten");
        self.inventory = new_inventory;
        Ok(())
    }
}
