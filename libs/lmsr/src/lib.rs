//! # LMSR Pool Library - Fixed-Point Pricing Engine
//!
//! ## Purpose
//!
//! Deterministic pricing engine for a multi-asset liquidity pool built on the
//! Logarithmic Market Scoring Rule with a liquidity depth that scales with the
//! pool (`b = κ·Σq`). Provides closed-form pairwise swaps, single-asset
//! deposit and withdrawal solvers, a polynomial fast path for near-parity
//! two-asset pools, and the rounding discipline that moves amounts between
//! external integer balances and internal 64.64 fixed-point units.
//!
//! ## Integration Points
//!
//! - **Input Sources**: pool definitions from `lmsr-config`, external deposits and trade requests
//! - **Output Destinations**: custody accounting ([`Pool`]), quote reports ([`QuoteReport`])
//! - **Numerics**: signed 64.64 fixed point ([`Fixed`]), bit-for-bit reproducible `exp`/`ln`
//! - **Validation**: typed errors with caller-facing categories ([`ErrorCategory`])
//!
//! ## Architecture Role
//!
//! [`LmsrState`] is the only persistent pricing entity. Kernels and solvers are
//! pure functions over an inventory snapshot; [`Pool`] plans every operation
//! against that snapshot and commits only after all fallible steps succeed.
//!
//! See [`architecture_diagram()`] for visual representation of the data flow.
//!
//! ## Usage
//!
//! ```rust
//! use lmsr::{Fixed, Pool, PoolParams};
//!
//! let params = PoolParams::new(Fixed::from_num(0.5), vec![100, 100]);
//! let mut pool = Pool::new(params).unwrap();
//! pool.initialize(&[1_000_000, 1_000_000]).unwrap();
//!
//! let receipt = pool.swap(0, 1, 10_000, None, 0).unwrap();
//! assert!(receipt.amount_out < 10_000);
//! ```

pub mod burn_solver;
pub mod cost;
pub mod error;
pub mod fast_path;
pub mod fixed_math;
pub mod kappa;
pub mod mint_solver;
pub mod pool;
pub mod report;
pub mod rounding;
pub mod state;
pub mod swap_kernel;

pub use burn_solver::{BurnQuote, BurnSolver};
pub use error::{ErrorCategory, LmsrError, PoolError, PoolResult};
pub use fast_path::{BalancedPairFastPath, FastSwapQuote, QuotePath};
pub use fixed_math::{decimal_to_fixed, fixed_to_decimal, Fixed};
pub use kappa::kappa_from_slippage;
pub use mint_solver::{MintQuote, MintSolver};
pub use pool::{
    BurnReceipt, MintReceipt, Pool, PoolParams, PoolSnapshot, ProportionalReceipt, SwapReceipt,
};
pub use report::{QuoteKind, QuoteReport};
pub use state::LmsrState;
pub use swap_kernel::{SwapKernel, SwapQuote};

/// Architecture diagram showing how a request flows through the engine
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph LR
///     subgraph Custody["🏦 Custody (Pool)"]
///         EXT[External Amounts]
///         FEE[Fee Schedule]
///         BASE[Base Denominators]
///         LP[LP Supply]
///     end
///
///     subgraph Rounding["🎯 Rounding Discipline"]
///         IN[floor into 64.64]
///         OUTC[ceil when received]
///         OUTF[floor when paid]
///     end
///
///     subgraph Engine["🧮 Pricing Engine"]
///         ST[LmsrState]
///         SK[Swap Kernel]
///         FP[Balanced-Pair Fast Path]
///         MS[Mint Solver]
///         BS[Burn Solver]
///         CO[Cost / Size]
///     end
///
///     EXT --> FEE
///     FEE --> IN
///     BASE --> IN
///     IN --> ST
///     ST --> SK
///     ST --> FP
///     FP -. fallback .-> SK
///     ST --> MS
///     ST --> BS
///     MS --> SK
///     BS --> SK
///     SK --> CO
///     SK --> OUTC
///     SK --> OUTF
///     MS --> LP
///     BS --> LP
///
///     style Custody fill:#e1f5fe
///     style Rounding fill:#fff3e0
///     style Engine fill:#f3e5f5
/// ```
pub fn architecture_diagram() {
    // This function exists solely for documentation purposes
    // The diagram is rendered by aquamarine in rustdoc
}
