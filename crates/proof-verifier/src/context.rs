//! Per-transition verification context

use alloy_primitives::{Address, B256};
use l1_integration::Transition;

/// What the ledger hands a verifier for one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofContext {
    /// Block the transition belongs to
    pub block_id: u64,
    /// Hash of the block's metadata
    pub meta_hash: B256,
    /// Prover credited with the proof
    pub prover: Address,
    /// Account submitting the proof
    pub msg_sender: Address,
    /// True when the proof disputes an existing transition instead of proving one
    pub is_contesting: bool,
    /// The transition being proven
    pub tran: Transition,
}
