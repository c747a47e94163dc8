//! Proof checker backends
//!
//! A checker is the external routine that decides whether a seal proves that
//! `image_id` produced a journal hashing to `journal_digest`.

use alloy_primitives::{Bytes, B256};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A checker that could not run at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("proof checker failed: {0}")]
pub struct CheckerError(pub String);

/// Pluggable proof-checking routine
pub trait ProofChecker: Send + Sync {
    /// `Ok(true)` accepts, `Ok(false)` rejects, `Err` means the check itself failed.
    /// The gateway treats anything but `Ok(true)` as an invalid proof.
    fn verify(&self, seal: &[u8], image_id: B256, journal_digest: B256) -> Result<bool, CheckerError>;
}

impl<T: ProofChecker + ?Sized> ProofChecker for std::sync::Arc<T> {
    fn verify(&self, seal: &[u8], image_id: B256, journal_digest: B256) -> Result<bool, CheckerError> {
        (**self).verify(seal, image_id, journal_digest)
    }
}

/// Dev-mode checker: a seal is valid iff it equals `sha256(image_id || journal_digest)`.
///
/// Provides no security; it only binds the seal to the exact digest so that devnets
/// and tests exercise the full verification path.
#[derive(Debug, Clone, Copy)]
pub struct DevModeChecker;

impl DevModeChecker {
    pub fn new() -> Self {
        tracing::warn!("Dev-mode proof checker enabled - proofs are NOT cryptographically verified");
        Self
    }

    /// Build the seal this checker accepts for `(image_id, journal_digest)`
    pub fn seal_for(image_id: B256, journal_digest: B256) -> Bytes {
        let mut hasher = Sha256::new();
        hasher.update(image_id);
        hasher.update(journal_digest);
        Bytes::copy_from_slice(&hasher.finalize())
    }
}

impl Default for DevModeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofChecker for DevModeChecker {
    fn verify(&self, seal: &[u8], image_id: B256, journal_digest: B256) -> Result<bool, CheckerError> {
        Ok(Self::seal_for(image_id, journal_digest).as_ref() == seal)
    }
}

/// Checker for disabled proof systems
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl ProofChecker for RejectAll {
    fn verify(&self, _seal: &[u8], _image_id: B256, _journal_digest: B256) -> Result<bool, CheckerError> {
        Err(CheckerError("proof system disabled".to_string()))
    }
}
