//! Error types for the pricing engine
//!
//! Every engine failure maps onto one of three caller-facing categories so the
//! custody layer can tell "bad request" apart from "math blew up" and from
//! "trade too small".

use crate::fixed_math::Fixed;
use thiserror::Error;

/// Caller-facing classification of an [`LmsrError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad index, non-positive amount/alpha, violated price-limit precondition
    InvalidInput,
    /// Exponent or logarithm argument outside the safe domain, overflow
    NumericalDomain,
    /// Computed output or consumed input is zero
    DegenerateResult,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LmsrError {
    #[error("Pricing state is not initialized")]
    NotInitialized,

    #[error("Pricing state is already initialized")]
    AlreadyInitialized,

    #[error("Pool needs at least 2 assets, got {0}")]
    TooFewAssets(usize),

    #[error("Asset index {index} out of range for {n_assets} assets")]
    InvalidAssetIndex { index: usize, n_assets: usize },

    #[error("Input and output asset must differ (both {0})")]
    SameAsset(usize),

    #[error("Inventory length mismatch: expected {expected}, got {actual}")]
    InventoryLengthMismatch { expected: usize, actual: usize },

    #[error("Inventory for asset {0} is negative")]
    NegativeInventory(usize),

    #[error("Kappa must be positive, got {0}")]
    NonPositiveKappa(Fixed),

    #[error("Size metric must be positive, got {0}")]
    NonPositiveSize(Fixed),

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Fixed),

    #[error("Amount must not be negative, got {0}")]
    NegativeAmount(Fixed),

    #[error("Alpha {0} outside (0, 1]")]
    InvalidAlpha(Fixed),

    #[error("Limit price {limit} at or below current price {price}")]
    LimitAtOrBelowPrice { limit: Fixed, price: Fixed },

    #[error("Insufficient inventory for asset {index}: need {needed}, have {available}")]
    InsufficientInventory {
        index: usize,
        needed: Fixed,
        available: Fixed,
    },

    #[error("Fee of {0} pips is 100% or more")]
    InvalidFee(u32),

    #[error("Base denominator must be positive")]
    ZeroBase,

    #[error("Exponent argument {0} outside safe domain")]
    ExpDomain(Fixed),

    #[error("Logarithm of non-positive value {0}")]
    LnDomain(Fixed),

    #[error("Inverse swap is degenerate: requested output {0} unreachable")]
    UnreachableOutput(Fixed),

    #[error("Fixed-point overflow")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Trade too small: {0}")]
    DegenerateTrade(&'static str),
}

impl LmsrError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LmsrError::ExpDomain(_)
            | LmsrError::LnDomain(_)
            | LmsrError::UnreachableOutput(_)
            | LmsrError::Overflow
            | LmsrError::DivisionByZero => ErrorCategory::NumericalDomain,
            LmsrError::DegenerateTrade(_) => ErrorCategory::DegenerateResult,
            _ => ErrorCategory::InvalidInput,
        }
    }

    /// True for failures the custody layer should present as "trade too small"
    pub fn is_degenerate(&self) -> bool {
        self.category() == ErrorCategory::DegenerateResult
    }
}

pub type Result<T> = std::result::Result<T, LmsrError>;

/// Custody-layer failures; engine errors pass through unchanged
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    #[error(transparent)]
    Engine(#[from] LmsrError),

    #[error("Pool is killed, only withdrawals are allowed")]
    Killed,

    #[error("Expected {expected} amounts, got {actual}")]
    WrongAssetCount { expected: usize, actual: usize },

    #[error("Initial deposit for asset {0} is zero")]
    ZeroDeposit(usize),

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Output {actual} below minimum {minimum}")]
    SlippageExceeded { minimum: u128, actual: u128 },

    #[error("Input {actual} above maximum {maximum}")]
    InputAboveMaximum { maximum: u128, actual: u128 },

    #[error("Burning {requested} LP exceeds supply {supply}")]
    InsufficientLpSupply { requested: u128, supply: u128 },

    #[error("Asset {asset} balance {available} cannot cover {needed}")]
    InsufficientBalance {
        asset: usize,
        needed: u128,
        available: u128,
    },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

impl PoolError {
    /// Engine reported a zero input or output
    pub fn is_trade_too_small(&self) -> bool {
        matches!(self, PoolError::Engine(err) if err.is_degenerate())
    }
}

pub type PoolResult<T> = std::result::Result<T, PoolError>;
