//! L1 checkpoint storage using DashMap for concurrent access

use alloy_primitives::B256;
use dashmap::DashMap;
use std::sync::Arc;

/// L1 block id -> state root, as synced by anchors
#[derive(Clone, Default)]
pub struct CheckpointStore {
    roots: Arc<DashMap<u64, B256>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, block_id: u64, state_root: B256) {
        self.roots.insert(block_id, state_root);
    }

    /// State root synced for `block_id`, if any
    pub fn get(&self, block_id: u64) -> Option<B256> {
        self.roots.get(&block_id).map(|r| *r.value())
    }

    pub fn contains(&self, block_id: u64) -> bool {
        self.roots.contains_key(&block_id)
    }

    pub fn all(&self) -> Vec<(u64, B256)> {
        let mut all: Vec<_> = self.roots.iter().map(|r| (*r.key(), *r.value())).collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
