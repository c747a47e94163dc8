//! Proof Verifier - Gateway between the L1 ledger and proof systems
//!
//! A verifier accepts an opaque proof for a single transition context:
//! - Decodes the proof into a seal and a zkVM image id
//! - Checks the image id against the owner-managed trust registry
//! - Rebuilds the public input hash and the journal digest
//! - Delegates accept/reject to a pluggable [`ProofChecker`] backend

pub mod checker;
pub mod context;
pub mod error;
pub mod gateway;
pub mod registry;

pub use checker::{CheckerError, DevModeChecker, ProofChecker, RejectAll};
pub use context::ProofContext;
pub use error::VerifierError;
pub use gateway::{decode_proof, encode_proof, journal_digest, ImageVerifier, ProofVerified};
pub use registry::ImageRegistry;

use l1_integration::TierProof;

/// 4-byte length header prepended to the public input hash before hashing
pub const JOURNAL_HEADER: [u8; 4] = 32u32.to_be_bytes();

/// A proof system gateway the ledger can route tiers to
pub trait ProofVerifier: Send + Sync {
    /// Verify `proof` for the given contexts.
    ///
    /// Returns `Ok(())` only if the proof was accepted (or deliberately skipped
    /// for a contesting context). Every other outcome is an error.
    fn verify_proof(&self, ctxs: &[ProofContext], proof: &TierProof) -> Result<(), VerifierError>;
}
