//! Persistence Layer for anchor state
//!
//! Uses sled embedded database to persist anchor records, synced L1
//! checkpoints and the anchor metadata across restarts.

use crate::anchor::AnchorRecord;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional};
use std::path::Path;
use thiserror::Error;

/// Reasons an anchor commit is aborted before touching disk
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    #[error("anchor for L2 block {0} is already stored")]
    AlreadyStored(u64),
}

/// Anchor state that is not a per-block record
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorMetadata {
    /// Newest L1 block whose state root was synced
    pub last_synced_block: u64,
    /// Current gas excess
    pub gas_excess: u64,
    /// Timestamp of the last anchored L2 block
    pub parent_timestamp: u64,
    /// Native balance held by the anchor
    pub balance: u128,
    /// Highest anchored L2 block
    pub head: Option<u64>,
}

/// Persistent storage for anchor state
pub struct AnchorStore {
    /// Sled database instance
    db: Db,
    /// L2 block number -> anchor record
    anchors: sled::Tree,
    /// L1 block id -> state root
    checkpoints: sled::Tree,
    /// Metadata tree
    metadata: sled::Tree,
}

impl AnchorStore {
    /// Open or create an anchor store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(&path)?;
        let anchors = db.open_tree("anchors")?;
        let checkpoints = db.open_tree("checkpoints")?;
        let metadata = db.open_tree("metadata")?;

        tracing::info!("Opened anchor store at {:?}", path.as_ref());

        Ok(Self {
            db,
            anchors,
            checkpoints,
            metadata,
        })
    }

    /// Store an anchor record
    pub fn store_anchor(&self, record: &AnchorRecord) -> anyhow::Result<()> {
        let bytes = bincode::serialize(record)?;
        self.anchors.insert(record.block_number.to_be_bytes(), bytes)?;
        Ok(())
    }

    /// Write an anchor record, its optional checkpoint and the new metadata in
    /// one transaction. Nothing is written if any part fails.
    pub fn commit_anchor(
        &self,
        record: &AnchorRecord,
        checkpoint: Option<(u64, B256)>,
        metadata: &AnchorMetadata,
    ) -> anyhow::Result<()> {
        let key = record.block_number.to_be_bytes();
        let record_bytes = bincode::serialize(record)?;
        let metadata_bytes = bincode::serialize(metadata)?;

        let result = (&self.anchors, &self.checkpoints, &self.metadata).transaction(
            |(anchors, checkpoints, meta)| {
                if let Some((block_id, state_root)) = checkpoint {
                    checkpoints.insert(&block_id.to_be_bytes()[..], state_root.as_slice())?;
                }
                meta.insert("anchor", metadata_bytes.as_slice())?;
                if anchors.insert(&key[..], record_bytes.as_slice())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(CommitError::AlreadyStored(
                        record.block_number,
                    )));
                }
                Ok(())
            },
        );

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e.into()),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        }
        self.flush()
    }

    /// Get the anchor record for an L2 block
    pub fn get_anchor(&self, block_number: u64) -> anyhow::Result<Option<AnchorRecord>> {
        match self.anchors.get(block_number.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All anchor records in block order
    pub fn get_all_anchors(&self) -> anyhow::Result<Vec<AnchorRecord>> {
        let mut records = Vec::new();
        for result in self.anchors.iter() {
            let (_, value) = result?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Store a synced L1 checkpoint
    pub fn store_checkpoint(&self, block_id: u64, state_root: B256) -> anyhow::Result<()> {
        self.checkpoints.insert(block_id.to_be_bytes(), state_root.as_slice())?;
        Ok(())
    }

    /// All synced checkpoints in block order
    pub fn get_all_checkpoints(&self) -> anyhow::Result<Vec<(u64, B256)>> {
        let mut checkpoints = Vec::new();
        for result in self.checkpoints.iter() {
            let (key, value) = result?;
            let id_bytes: [u8; 8] = key
                .as_ref()
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid checkpoint key length"))?;
            if value.len() != 32 {
                anyhow::bail!("Invalid checkpoint root length {}", value.len());
            }
            checkpoints.push((u64::from_be_bytes(id_bytes), B256::from_slice(&value)));
        }
        Ok(checkpoints)
    }

    /// Save anchor metadata
    pub fn save_metadata(&self, metadata: &AnchorMetadata) -> anyhow::Result<()> {
        let bytes = bincode::serialize(metadata)?;
        self.metadata.insert("anchor", bytes)?;
        Ok(())
    }

    /// Load anchor metadata
    pub fn load_metadata(&self) -> anyhow::Result<Option<AnchorMetadata>> {
        match self.metadata.get("anchor")? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the number of stored anchors
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}
