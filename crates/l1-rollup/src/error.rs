//! L1 rollup errors

use l1_integration::{AccessError, ConfigError};
use proof_verifier::VerifierError;
use thiserror::Error;

/// Ledger lookup errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid block id {0}")]
    InvalidBlockId(u64),

    #[error("transition not found for block {0}")]
    TransitionNotFound(u64),

    #[error("unexpected transition id {tid} for block {block_id}")]
    UnexpectedTransitionId { block_id: u64, tid: u32 },
}

/// Rollup state machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollupError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("too many unverified blocks ({num_blocks} proposed, {last_verified} verified)")]
    TooManyBlocks { num_blocks: u64, last_verified: u64 },

    #[error("invalid anchor block {0}")]
    InvalidAnchorBlock(u64),

    #[error("invalid timestamp {0}")]
    InvalidTimestamp(u64),

    #[error("gas limit {0} exceeds the block maximum")]
    InvalidGasLimit(u32),

    #[error("metadata does not match block {0}")]
    BlockMismatch(u64),

    #[error("transition must carry a parent hash, block hash and state root")]
    InvalidTransition,

    #[error("invalid tier {0}")]
    InvalidTier(u16),

    #[error("block {0} already proved with this transition")]
    AlreadyProved(u64),

    #[error("block {0} transition already contested")]
    AlreadyContested(u64),

    #[error("proving is paused")]
    ProvingPaused,
}
