//! Node Configuration

use alloy_primitives::{Address, B256};
use l1_integration::RollupConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Devnet node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// L1 rollup parameters
    pub rollup: RollupConfig,
    /// Owner of the rollup, the image registry and the anchor
    pub owner: Address,
    /// Hash of L2 block 0
    pub genesis_hash: B256,
    /// Address of the zkVM verifier gateway
    pub verifier_address: Address,
    /// zkVM image ids trusted at startup; the first one seals devnet proofs
    pub trusted_images: Vec<B256>,
    /// Tick interval in milliseconds
    pub block_time_ms: u64,
    /// Anchor state directory (in-memory when unset)
    pub data_dir: Option<PathBuf>,
    /// Stop after this many blocks (0 = run until ctrl-c)
    pub blocks: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rollup: RollupConfig::default(),
            owner: Address::with_last_byte(0x01),
            genesis_hash: B256::with_last_byte(0x01),
            verifier_address: Address::with_last_byte(0x29),
            trusted_images: vec![B256::repeat_byte(0x1d)],
            block_time_ms: 1_000,
            data_dir: None,
            blocks: 0,
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file; missing keys take defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.rollup.validate()?;
        if self.trusted_images.is_empty() {
            anyhow::bail!("at least one trusted image id is required");
        }
        if self.block_time_ms == 0 {
            anyhow::bail!("block time must be non-zero");
        }
        Ok(())
    }
}
