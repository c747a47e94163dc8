//! Ring-buffer block and transition ledger
//!
//! Block `id` lives in slot `id % capacity`. Each slot owns a transition table
//! indexed by transition id; index 0 is a placeholder so a zero id can mean
//! "none". Transition 1 is found through its own key, later transitions through
//! a `(block_id, parent_hash)` index. Recycling a slot drops the previous
//! occupant's transitions and index entries.

use crate::error::LedgerError;
use alloy_primitives::{Address, B256};
use serde::Serialize;
use std::collections::HashMap;

/// A proposed block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub id: u64,
    pub meta_hash: B256,
    pub proposer: Address,
    /// L1 timestamp at proposal
    pub proposed_at: u64,
    /// L1 block number at proposal
    pub proposed_in: u64,
    pub next_transition_id: u32,
    /// Zero until the block is verified
    pub verified_transition_id: u32,
}

impl Block {
    pub fn new(id: u64, meta_hash: B256, proposer: Address, proposed_at: u64, proposed_in: u64) -> Self {
        Self {
            id,
            meta_hash,
            proposer,
            proposed_at,
            proposed_in,
            next_transition_id: 1,
            verified_transition_id: 0,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_transition_id != 0
    }
}

/// Stored proof result for one parent hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionState {
    /// Parent hash this transition extends
    pub key: B256,
    pub block_hash: B256,
    pub state_root: B256,
    pub prover: Address,
    pub tier: u16,
    /// L1 timestamp of the last proof or contest
    pub timestamp: u64,
    pub contester: Option<Address>,
}

impl TransitionState {
    pub fn is_contested(&self) -> bool {
        self.contester.is_some()
    }
}

/// Transition lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRef {
    Parent(B256),
    Index(u32),
}

impl From<B256> for TransitionRef {
    fn from(parent_hash: B256) -> Self {
        TransitionRef::Parent(parent_hash)
    }
}

impl From<u32> for TransitionRef {
    fn from(tid: u32) -> Self {
        TransitionRef::Index(tid)
    }
}

/// Fixed-capacity block ledger
pub struct Ledger {
    capacity: u64,
    blocks: Vec<Option<Block>>,
    transitions: Vec<Vec<TransitionState>>,
    transition_ids: HashMap<(u64, B256), u32>,
}

impl Ledger {
    /// Slots are allocated lazily as block ids grow, up to `capacity`.
    pub fn new(capacity: u64) -> Self {
        debug_assert!(capacity > 0, "ledger capacity must be non-zero");
        Self {
            capacity: capacity.max(1),
            blocks: Vec::new(),
            transitions: Vec::new(),
            transition_ids: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn slot_of(&self, block_id: u64) -> usize {
        (block_id % self.capacity) as usize
    }

    /// Block `block_id` and its slot; fails if the slot holds another block
    pub fn get_block(&self, block_id: u64) -> Result<(&Block, usize), LedgerError> {
        let slot = self.slot_of(block_id);
        self.blocks
            .get(slot)
            .and_then(Option::as_ref)
            .filter(|blk| blk.id == block_id)
            .map(|blk| (blk, slot))
            .ok_or(LedgerError::InvalidBlockId(block_id))
    }

    fn get_block_mut(&mut self, block_id: u64) -> Result<(&mut Block, usize), LedgerError> {
        let slot = self.slot_of(block_id);
        self.blocks
            .get_mut(slot)
            .and_then(Option::as_mut)
            .filter(|blk| blk.id == block_id)
            .map(|blk| (blk, slot))
            .ok_or(LedgerError::InvalidBlockId(block_id))
    }

    /// Store `block`, recycling whatever its slot held before
    pub fn insert_block(&mut self, block: Block) -> usize {
        let slot = self.slot_of(block.id);
        if slot >= self.blocks.len() {
            self.blocks.resize_with(slot + 1, || None);
            self.transitions.resize_with(slot + 1, Vec::new);
        }

        if let Some(old) = self.blocks[slot].take() {
            tracing::debug!("Recycling slot {} (block {} -> {})", slot, old.id, block.id);
            for ts in self.transitions[slot].iter().skip(2) {
                self.transition_ids.remove(&(old.id, ts.key));
            }
        }

        let table = &mut self.transitions[slot];
        table.clear();
        table.push(TransitionState::default());

        self.blocks[slot] = Some(block);
        slot
    }

    /// Transition id for `(block_id, parent_hash)`, zero if none exists
    pub fn get_transition_id(&self, block_id: u64, parent_hash: B256) -> Result<u32, LedgerError> {
        let (blk, slot) = self.get_block(block_id)?;

        let tid = match self.transitions[slot].get(1) {
            Some(first) if first.key == parent_hash => 1,
            _ => self
                .transition_ids
                .get(&(block_id, parent_hash))
                .copied()
                .unwrap_or(0),
        };

        if tid >= blk.next_transition_id {
            return Err(LedgerError::UnexpectedTransitionId { block_id, tid });
        }
        Ok(tid)
    }

    /// Transition by parent hash
    pub fn get_transition_by_parent(
        &self,
        block_id: u64,
        parent_hash: B256,
    ) -> Result<&TransitionState, LedgerError> {
        match self.get_transition_id(block_id, parent_hash)? {
            0 => Err(LedgerError::TransitionNotFound(block_id)),
            tid => self.get_transition_by_index(block_id, tid),
        }
    }

    /// Transition by id
    pub fn get_transition_by_index(&self, block_id: u64, tid: u32) -> Result<&TransitionState, LedgerError> {
        let (blk, slot) = self.get_block(block_id)?;
        if tid == 0 || tid >= blk.next_transition_id {
            return Err(LedgerError::TransitionNotFound(block_id));
        }
        self.transitions[slot]
            .get(tid as usize)
            .ok_or(LedgerError::TransitionNotFound(block_id))
    }

    pub fn get_transition(
        &self,
        block_id: u64,
        by: impl Into<TransitionRef>,
    ) -> Result<&TransitionState, LedgerError> {
        match by.into() {
            TransitionRef::Parent(parent_hash) => self.get_transition_by_parent(block_id, parent_hash),
            TransitionRef::Index(tid) => self.get_transition_by_index(block_id, tid),
        }
    }

    /// `(block_hash, state_root)` of the verified transition, zeros if unverified
    pub fn get_block_info(&self, block_id: u64) -> Result<(B256, B256), LedgerError> {
        let (blk, _) = self.get_block(block_id)?;
        if !blk.is_verified() {
            return Ok((B256::ZERO, B256::ZERO));
        }
        let ts = self.get_transition_by_index(block_id, blk.verified_transition_id)?;
        Ok((ts.block_hash, ts.state_root))
    }

    /// Return the transition for `parent_hash`, allocating the next id if absent
    pub fn create_transition(&mut self, block_id: u64, parent_hash: B256) -> Result<u32, LedgerError> {
        let existing = self.get_transition_id(block_id, parent_hash)?;
        if existing != 0 {
            return Ok(existing);
        }

        let (blk, slot) = self.get_block_mut(block_id)?;
        let tid = blk.next_transition_id;
        blk.next_transition_id += 1;

        let table = &mut self.transitions[slot];
        debug_assert_eq!(table.len(), tid as usize);
        table.push(TransitionState {
            key: parent_hash,
            ..Default::default()
        });

        if tid != 1 {
            self.transition_ids.insert((block_id, parent_hash), tid);
        }
        Ok(tid)
    }

    pub(crate) fn transition_mut(
        &mut self,
        block_id: u64,
        tid: u32,
    ) -> Result<&mut TransitionState, LedgerError> {
        let (blk, slot) = self.get_block(block_id)?;
        if tid == 0 || tid >= blk.next_transition_id {
            return Err(LedgerError::TransitionNotFound(block_id));
        }
        self.transitions[slot]
            .get_mut(tid as usize)
            .ok_or(LedgerError::TransitionNotFound(block_id))
    }

    /// Drop the newest transition of `block_id`, which must be `tid`
    pub(crate) fn discard_transition(&mut self, block_id: u64, tid: u32) -> Result<(), LedgerError> {
        let (blk, slot) = self.get_block_mut(block_id)?;
        if tid == 0 || tid + 1 != blk.next_transition_id {
            return Err(LedgerError::TransitionNotFound(block_id));
        }
        blk.next_transition_id = tid;

        if let Some(ts) = self.transitions[slot].pop() {
            if tid != 1 {
                self.transition_ids.remove(&(block_id, ts.key));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn insert_index_entry(&mut self, block_id: u64, parent_hash: B256, tid: u32) {
        self.transition_ids.insert((block_id, parent_hash), tid);
    }

    pub(crate) fn set_verified(&mut self, block_id: u64, tid: u32) -> Result<(), LedgerError> {
        let (blk, _) = self.get_block_mut(block_id)?;
        if tid == 0 || tid >= blk.next_transition_id {
            return Err(LedgerError::TransitionNotFound(block_id));
        }
        blk.verified_transition_id = tid;
        Ok(())
    }

    /// Number of secondary index entries (transitions beyond the first per block)
    pub fn indexed_transitions(&self) -> usize {
        self.transition_ids.len()
    }
}
