//! # LMSR Pool Configuration
//!
//! This crate loads and validates pool definitions for the LMSR pricing
//! engine: the ordered asset list with per-asset swap fees, the liquidity
//! parameter (explicit or derived from a slippage target), LP settings and
//! solver switches.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lmsr_config::PoolConfig;
//! use std::path::Path;
//!
//! let config = PoolConfig::load(Path::new("config/pool.toml")).unwrap();
//! let usdc = config.asset_index("USDC");
//! ```

pub mod pool_config;

// Re-export commonly used types
pub use pool_config::{AssetSettings, PoolConfig, PoolSettings, SolverSettings, PIPS_DENOMINATOR};
