//! Core records shared by the L1 ledger, the proof verifiers and L2
//!
//! The `sol!` structs are hashed with their Solidity ABI encoding so that any
//! independent implementation can reproduce the same digests.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::{sol, SolValue};
use serde::{Deserialize, Serialize};

use crate::VERIFY_PROOF_DOMAIN;

sol! {
    /// Base-fee parameters committed into every proposed block
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct BaseFeeConfig {
        uint8 adjustment_quotient;
        uint8 sharing_pctg;
        uint32 gas_issuance_per_second;
        uint64 min_gas_excess;
        uint32 max_gas_issuance_per_block;
    }

    /// A candidate state evolution for one block, keyed by its parent hash
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    struct Transition {
        bytes32 parent_hash;
        bytes32 block_hash;
        bytes32 state_root;
        bytes32 graffiti;
    }

    /// Everything the L1 commits to when a block is proposed
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    struct BlockMetadata {
        bytes32 anchor_block_hash;
        bytes32 difficulty;
        bytes32 tx_list_hash;
        bytes32 extra_data;
        address coinbase;
        uint64 id;
        uint32 gas_limit;
        uint64 timestamp;
        uint64 anchor_block_id;
        bytes32 parent_meta_hash;
        address proposer;
        uint64 proposed_at;
        uint64 proposed_in;
        BaseFeeConfig base_fee_config;
    }
}

impl Default for BaseFeeConfig {
    fn default() -> Self {
        Self {
            adjustment_quotient: 8,
            sharing_pctg: 75,
            gas_issuance_per_second: 5_000_000,
            min_gas_excess: 1_340_000_000,
            max_gas_issuance_per_block: 600_000_000,
        }
    }
}

impl BaseFeeConfig {
    /// Check the parameters are usable
    pub fn is_valid(&self) -> bool {
        self.adjustment_quotient != 0 && self.sharing_pctg <= 100
    }
}

impl Transition {
    /// Parent, block hash and state root must all be set
    pub fn is_complete(&self) -> bool {
        !self.parent_hash.is_zero() && !self.block_hash.is_zero() && !self.state_root.is_zero()
    }
}

impl BlockMetadata {
    /// keccak256 of the ABI encoded metadata
    pub fn hash(&self) -> B256 {
        keccak256(self.abi_encode())
    }
}

/// A proof submitted for a transition, tagged with the tier it claims
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProof {
    pub tier: u16,
    pub data: Bytes,
}

impl TierProof {
    pub fn new(tier: u16, data: impl Into<Bytes>) -> Self {
        Self {
            tier,
            data: data.into(),
        }
    }
}

/// Hash the public inputs a validity proof commits to.
///
/// `new_instance` is a reserved slot that current verifiers fill with the zero
/// address; it stays in the encoding so digests remain stable.
pub fn hash_public_inputs(
    tran: &Transition,
    verifier: Address,
    new_instance: Address,
    prover: Address,
    meta_hash: B256,
    chain_id: u64,
) -> B256 {
    let encoded = (
        VERIFY_PROOF_DOMAIN.to_string(),
        chain_id,
        verifier,
        tran.clone(),
        new_instance,
        prover,
        meta_hash,
    )
        .abi_encode_params();

    keccak256(encoded)
}
