//! Owner-style access control

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access-control errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("caller {0} is not the owner")]
    NotOwner(Address),

    #[error("owner cannot be the zero address")]
    ZeroAddress,
}

/// Single owner authority gating administrative calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    pub fn new(owner: Address) -> Result<Self, AccessError> {
        if owner.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        Ok(Self { owner })
    }

    /// Current owner
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Fail unless `caller` is the current owner
    pub fn ensure_owner(&self, caller: Address) -> Result<(), AccessError> {
        if caller != self.owner {
            return Err(AccessError::NotOwner(caller));
        }
        Ok(())
    }

    /// Hand ownership to `new_owner` (owner only)
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), AccessError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        self.owner = new_owner;
        Ok(())
    }
}
