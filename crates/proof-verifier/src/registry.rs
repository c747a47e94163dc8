//! Trusted image registry
//!
//! Maps zkVM image ids to a trusted flag. Only the owner may toggle entries;
//! any id that was never set reads as untrusted.

use crate::error::VerifierError;
use alloy_primitives::{Address, B256};
use l1_integration::Ownable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct RegistryState {
    owner: Ownable,
    trusted: HashMap<B256, bool>,
}

/// Shared handle to the trusted image registry
#[derive(Clone)]
pub struct ImageRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl ImageRegistry {
    /// Create an empty registry owned by `owner`
    pub fn new(owner: Address) -> Result<Self, VerifierError> {
        Ok(Self {
            inner: Arc::new(RwLock::new(RegistryState {
                owner: Ownable::new(owner)?,
                trusted: HashMap::new(),
            })),
        })
    }

    /// Set whether `image_id` is trusted (owner only)
    pub fn set_image_id_trusted(
        &self,
        caller: Address,
        image_id: B256,
        trusted: bool,
    ) -> Result<(), VerifierError> {
        let mut state = self.inner.write();
        state.owner.ensure_owner(caller)?;
        state.trusted.insert(image_id, trusted);

        tracing::info!("Image {} trusted: {}", image_id, trusted);
        Ok(())
    }

    /// Check whether `image_id` is trusted
    pub fn is_trusted(&self, image_id: &B256) -> bool {
        self.inner
            .read()
            .trusted
            .get(image_id)
            .copied()
            .unwrap_or(false)
    }

    /// Current owner
    pub fn owner(&self) -> Address {
        self.inner.read().owner.owner()
    }

    /// Hand the registry to a new owner (owner only)
    pub fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<(), VerifierError> {
        self.inner.write().owner.transfer_ownership(caller, new_owner)?;
        Ok(())
    }
}
