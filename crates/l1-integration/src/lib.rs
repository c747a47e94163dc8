//! Shared types for L1/L2 integration
//!
//! Everything both layers have to agree on byte-for-byte lives here:
//! - Block metadata and transition records (ABI encoded, keccak hashed)
//! - Public input hashing used by proof verifiers
//! - Rollup and base-fee configuration
//! - Owner-style access control

pub mod access;
pub mod config;
pub mod types;

pub use access::{AccessError, Ownable};
pub use config::{ConfigError, RollupConfig};
pub use types::{hash_public_inputs, BaseFeeConfig, BlockMetadata, TierProof, Transition};

/// Domain separator mixed into every proof public input hash
pub const VERIFY_PROOF_DOMAIN: &str = "VERIFY_PROOF";

/// Proof tiers understood by the L1 rollup
pub mod tiers {
    /// Validity proof from a zkVM image
    pub const TIER_ZKVM: u16 = 290;
    /// Highest tier, used to settle contested transitions
    pub const TIER_GUARDIAN: u16 = 1000;
}
