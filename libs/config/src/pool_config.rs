//! Pool Configuration Module
//!
//! Loads the pool definition (assets, fee schedule, liquidity parameter and
//! solver switches) from TOML with `LMSR_`-prefixed environment overrides.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Fee and share values are expressed in pips (1e-6)
pub const PIPS_DENOMINATOR: u32 = 1_000_000;

/// Main pool configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolConfig {
    /// Liquidity and LP settings
    #[serde(default)]
    pub pool: PoolSettings,

    /// Assets in pool order; the index of an entry is its asset index
    pub assets: Vec<AssetSettings>,

    /// Solver switches
    #[serde(default)]
    pub solver: SolverSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolSettings {
    /// Explicit liquidity parameter; derived from the slippage target when absent
    pub kappa: Option<Decimal>,
    /// Relative slippage a balanced pool should show for a `trade_fraction` trade
    #[serde(default = "default_target_slippage")]
    pub target_slippage: Decimal,
    /// Reference trade as a fraction of one asset's balance
    #[serde(default = "default_trade_fraction")]
    pub trade_fraction: Decimal,
    /// Share of every swap fee set aside for the protocol, in pips
    #[serde(default)]
    pub protocol_fee_share_pips: u32,
    /// LP tokens minted per unit of size metric at initialisation
    #[serde(default = "default_lp_unit")]
    pub lp_unit: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetSettings {
    pub symbol: String,
    /// Swap fee charged when this asset is on either side of a trade, in pips
    #[serde(default)]
    pub fee_pips: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SolverSettings {
    /// Use the balanced-pair approximation for two-asset pools
    #[serde(default)]
    pub fast_path: bool,
}

fn default_target_slippage() -> Decimal {
    Decimal::new(1, 3)
}

fn default_trade_fraction() -> Decimal {
    Decimal::new(1, 2)
}

fn default_lp_unit() -> u64 {
    1_000_000_000_000_000_000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            kappa: None,
            target_slippage: default_target_slippage(),
            trade_fraction: default_trade_fraction(),
            protocol_fee_share_pips: 0,
            lp_unit: default_lp_unit(),
        }
    }
}

impl PoolConfig {
    /// Load configuration from a TOML file with environment overrides
    ///
    /// Overrides use the `LMSR_` prefix and `__` between nesting levels,
    /// e.g. `LMSR_POOL__KAPPA=0.05` or `LMSR_SOLVER__FAST_PATH=true`.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading pool config: {:?}", path);

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix("LMSR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let pool: PoolConfig = config
            .try_deserialize()
            .context("Failed to deserialize pool configuration")?;
        pool.validate()?;
        Ok(pool)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let pool: PoolConfig = toml::from_str(content).context("Failed to parse pool configuration")?;
        pool.validate()?;
        Ok(pool)
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.len() < 2 {
            bail!("Pool needs at least 2 assets, got {}", self.assets.len());
        }

        let mut symbols = HashSet::new();
        for asset in &self.assets {
            if !symbols.insert(asset.symbol.as_str()) {
                bail!("Duplicate asset symbol {}", asset.symbol);
            }
        }

        // Pair fees are additive, so the two largest fees bound every pair
        let mut fees: Vec<u32> = self.assets.iter().map(|a| a.fee_pips).collect();
        fees.sort_unstable_by(|a, b| b.cmp(a));
        let worst_pair = fees[0].saturating_add(fees[1]);
        if worst_pair >= PIPS_DENOMINATOR {
            bail!("Pair fee {} pips reaches 100%", worst_pair);
        }

        if self.pool.protocol_fee_share_pips > PIPS_DENOMINATOR {
            bail!(
                "Protocol fee share {} pips exceeds 100%",
                self.pool.protocol_fee_share_pips
            );
        }
        if self.pool.lp_unit == 0 {
            bail!("lp_unit must be positive");
        }

        match self.pool.kappa {
            Some(kappa) if kappa <= Decimal::ZERO => bail!("kappa must be positive, got {}", kappa),
            Some(_) => {}
            None => {
                if self.pool.target_slippage <= Decimal::ZERO {
                    bail!("target_slippage must be positive");
                }
                if self.pool.trade_fraction <= Decimal::ZERO || self.pool.trade_fraction > Decimal::ONE {
                    bail!("trade_fraction must be in (0, 1]");
                }
            }
        }

        debug!(assets = self.assets.len(), "Pool configuration validated");
        Ok(())
    }

    /// Asset index for a symbol
    pub fn asset_index(&self, symbol: &str) -> Option<usize> {
        self.assets.iter().position(|a| a.symbol == symbol)
    }

    pub fn fee_schedule(&self) -> Vec<u32> {
        self.assets.iter().map(|a| a.fee_pips).collect()
    }
}
