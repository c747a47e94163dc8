//! Rollup configuration shared by L1 and L2

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BaseFeeConfig;

/// Configuration errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("block ring buffer size must be non-zero")]
    ZeroRingBufferSize,

    #[error("block max proposals must be non-zero")]
    ZeroMaxProposals,

    #[error("block max proposals ({proposals}) must be smaller than the ring buffer size ({ring})")]
    RingBufferTooSmall { proposals: u64, ring: u64 },

    #[error("invalid base fee config")]
    InvalidBaseFeeConfig,
}

/// Deployment-time rollup parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    /// L1 chain id
    pub chain_id: u64,
    /// L2 chain id (mixed into proof public inputs)
    pub l2_chain_id: u64,
    /// Number of block slots in the ring ledger
    pub block_ring_buffer_size: u64,
    /// Maximum number of unverified blocks in flight
    pub block_max_proposals: u64,
    /// Maximum blocks verified per sweep (0 pauses verification)
    pub max_blocks_to_verify: u64,
    /// Gas limit cap for a proposed block
    pub block_max_gas_limit: u32,
    /// How far behind the current L1 block an anchor may be
    pub max_anchor_height_offset: u64,
    /// Verified blocks between state root checkpoints
    pub state_root_sync_interval: u64,
    /// Base-fee parameters committed into each block
    pub base_fee_config: BaseFeeConfig,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            l2_chain_id: 167_000,
            block_ring_buffer_size: 360_000,
            block_max_proposals: 324_000,
            max_blocks_to_verify: 16,
            block_max_gas_limit: 240_000_000,
            max_anchor_height_offset: 64,
            state_root_sync_interval: 16,
            base_fee_config: BaseFeeConfig::default(),
        }
    }
}

impl RollupConfig {
    /// Reject configurations the ledger cannot operate safely with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_ring_buffer_size == 0 {
            return Err(ConfigError::ZeroRingBufferSize);
        }
        if self.block_max_proposals == 0 {
            return Err(ConfigError::ZeroMaxProposals);
        }
        // One extra slot keeps the last verified block readable
        if self.block_max_proposals >= self.block_ring_buffer_size {
            return Err(ConfigError::RingBufferTooSmall {
                proposals: self.block_max_proposals,
                ring: self.block_ring_buffer_size,
            });
        }
        if !self.base_fee_config.is_valid() {
            return Err(ConfigError::InvalidBaseFeeConfig);
        }
        Ok(())
    }
}
