//! L2 Runtime - Anchor guard and L1 checkpoint state
//!
//! This crate provides the L2 side of the rollup:
//! - Golden-touch signer with two fixed nonces for anchor transactions
//! - Once-per-block anchor guard keyed by L2 block number
//! - L1 checkpoint store and gas excess tracking
//! - Optional sled persistence of anchor state

pub mod anchor;
pub mod checkpoint;
pub mod gas;
pub mod golden_touch;
pub mod persistence;

pub use anchor::{AnchorError, AnchorInput, AnchorRecord, Anchored, L2Anchor, L2Context};
pub use checkpoint::CheckpointStore;
pub use gas::{gas_issuance, next_gas_excess};
pub use golden_touch::{
    GoldenTouchSignature, GoldenTouchSigner, NonceSelector, SignerError, GOLDEN_TOUCH_ADDRESS,
    GOLDEN_TOUCH_PRIVATE_KEY,
};
pub use persistence::{AnchorMetadata, AnchorStore, CommitError};

/// Nonce selector tried first when signing anchors
pub const DEFAULT_NONCE_SELECTOR: u8 = 1;
