//! L1 Rollup - Block ledger and finalization on the settlement layer
//!
//! Tracks proposed L2 blocks and the transitions proven for them:
//! - Fixed-capacity ring ledger of blocks and per-block transitions
//! - Tiered proof submission routed to pluggable proof verifiers
//! - Periodic verification sweeps that finalize consecutive blocks

pub mod error;
pub mod ledger;
pub mod rollup;
pub mod scheduler;

pub use error::{LedgerError, RollupError};
pub use ledger::{Block, Ledger, TransitionRef, TransitionState};
pub use rollup::{BlockParams, L1Context, Rollup, RollupBuilder, RollupEvent, RollupStats, GENESIS_META_HASH};
pub use scheduler::should_verify_blocks;
