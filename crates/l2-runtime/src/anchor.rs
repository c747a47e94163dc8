//! L2 anchor - imports L1 checkpoints once per L2 block
//!
//! Only the golden-touch address may anchor, and only once per L2 block: the
//! public input hash of the first anchor is recorded under the block number and
//! any later attempt for the same block is rejected.

use crate::checkpoint::CheckpointStore;
use crate::gas::next_gas_excess;
use crate::golden_touch::{GoldenTouchSignature, SignerError};
use crate::persistence::{AnchorMetadata, AnchorStore};
use alloy_primitives::{keccak256, Address, B256};
use alloy_sol_types::SolValue;
use dashmap::DashMap;
use l1_integration::{AccessError, BaseFeeConfig, Ownable};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::sync::broadcast;

/// Anchor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("invalid anchor sender {0}")]
    InvalidSender(Address),

    #[error("block {block_number} already anchored (recorded {recorded}, got {computed})")]
    PublicInputHashMismatch {
        block_number: u64,
        recorded: B256,
        computed: B256,
    },

    #[error("invalid base fee config")]
    InvalidBaseFeeConfig,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("anchor storage failed: {0}")]
    Storage(String),
}

/// Anchor call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorInput {
    pub anchor_block_id: u64,
    pub anchor_state_root: B256,
    pub parent_gas_used: u32,
    pub base_fee_config: BaseFeeConfig,
}

impl AnchorInput {
    /// Hash over the checkpoint id, state root, parent gas used and base-fee config
    pub fn public_input_hash(&self) -> B256 {
        keccak256(
            (
                self.anchor_block_id,
                self.anchor_state_root,
                self.parent_gas_used,
                self.base_fee_config.clone(),
            )
                .abi_encode_params(),
        )
    }

    /// Digest the golden-touch signer signs for the anchor in `block_number`
    pub fn signing_hash(&self, block_number: u64) -> B256 {
        keccak256((block_number, self.public_input_hash()).abi_encode_params())
    }
}

/// The L2 block an anchor executes in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct L2Context {
    pub block_number: u64,
    /// Hash of block `block_number - 1`
    pub parent_hash: B256,
    pub timestamp: u64,
}

/// Recorded once per anchored L2 block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub block_number: u64,
    pub parent_hash: B256,
    pub anchor_block_id: u64,
    pub anchor_state_root: B256,
    pub parent_gas_used: u32,
    pub public_input_hash: B256,
    /// Gas excess after this anchor
    pub gas_excess: u64,
}

/// Emitted for every successful anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchored {
    pub block_number: u64,
    pub anchor_block_id: u64,
    pub public_input_hash: B256,
    pub gas_excess: u64,
}

/// The L2 anchor contract state
pub struct L2Anchor {
    golden_touch: Address,
    owner: Mutex<Ownable>,
    /// L2 block number -> anchor record
    records: DashMap<u64, AnchorRecord>,
    checkpoints: CheckpointStore,
    /// Serializes anchors; also holds the non-record state
    meta: Mutex<AnchorMetadata>,
    store: Option<AnchorStore>,
    events: broadcast::Sender<Anchored>,
}

impl L2Anchor {
    /// In-memory anchor accepting calls from `golden_touch`
    pub fn new(golden_touch: Address, owner: Address, base_fee_config: &BaseFeeConfig) -> Result<Self, AnchorError> {
        let (events, _) = broadcast::channel(256);
        Ok(Self {
            golden_touch,
            owner: Mutex::new(Ownable::new(owner)?),
            records: DashMap::new(),
            checkpoints: CheckpointStore::new(),
            meta: Mutex::new(AnchorMetadata {
                gas_excess: base_fee_config.min_gas_excess,
                ..Default::default()
            }),
            store: None,
            events,
        })
    }

    /// Anchor backed by a sled store at `path`, restoring any saved state
    pub fn open<P: AsRef<Path>>(
        path: P,
        golden_touch: Address,
        owner: Address,
        base_fee_config: &BaseFeeConfig,
    ) -> anyhow::Result<Self> {
        let store = AnchorStore::open(path)?;
        let mut anchor = Self::new(golden_touch, owner, base_fee_config)?;

        for record in store.get_all_anchors()? {
            anchor.records.insert(record.block_number, record);
        }
        for (block_id, state_root) in store.get_all_checkpoints()? {
            anchor.checkpoints.save(block_id, state_root);
        }
        if let Some(meta) = store.load_metadata()? {
            *anchor.meta.get_mut() = meta;
        }

        tracing::info!(
            "Loaded {} anchors and {} checkpoints from disk",
            anchor.records.len(),
            anchor.checkpoints.len()
        );

        anchor.store = Some(store);
        Ok(anchor)
    }

    /// Subscribe to anchor events
    pub fn subscribe(&self) -> broadcast::Receiver<Anchored> {
        self.events.subscribe()
    }

    pub fn golden_touch(&self) -> Address {
        self.golden_touch
    }

    /// Anchor the L1 checkpoint in `input` into L2 block `ctx.block_number`
    pub fn anchor(
        &self,
        caller: Address,
        ctx: &L2Context,
        input: &AnchorInput,
    ) -> Result<AnchorRecord, AnchorError> {
        if caller != self.golden_touch {
            tracing::warn!("Rejected anchor from {} in block {}", caller, ctx.block_number);
            return Err(AnchorError::InvalidSender(caller));
        }
        if !input.base_fee_config.is_valid() {
            return Err(AnchorError::InvalidBaseFeeConfig);
        }

        let mut meta = self.meta.lock();

        let public_input_hash = input.public_input_hash();
        if let Some(existing) = self.records.get(&ctx.block_number) {
            return Err(AnchorError::PublicInputHashMismatch {
                block_number: ctx.block_number,
                recorded: existing.public_input_hash,
                computed: public_input_hash,
            });
        }

        let elapsed = ctx.timestamp.saturating_sub(meta.parent_timestamp);
        let gas_excess = next_gas_excess(
            &input.base_fee_config,
            meta.gas_excess,
            input.parent_gas_used,
            elapsed,
        );
        let sync_checkpoint = input.anchor_block_id > meta.last_synced_block;

        let record = AnchorRecord {
            block_number: ctx.block_number,
            parent_hash: ctx.parent_hash,
            anchor_block_id: input.anchor_block_id,
            anchor_state_root: input.anchor_state_root,
            parent_gas_used: input.parent_gas_used,
            public_input_hash,
            gas_excess,
        };
        let next_meta = AnchorMetadata {
            last_synced_block: if sync_checkpoint {
                input.anchor_block_id
            } else {
                meta.last_synced_block
            },
            gas_excess,
            parent_timestamp: ctx.timestamp,
            balance: meta.balance,
            head: Some(meta.head.map_or(ctx.block_number, |h| h.max(ctx.block_number))),
        };

        // Disk first: a failed write leaves memory untouched
        if let Some(store) = &self.store {
            let checkpoint = sync_checkpoint.then_some((input.anchor_block_id, input.anchor_state_root));
            store
                .commit_anchor(&record, checkpoint, &next_meta)
                .map_err(|e| AnchorError::Storage(e.to_string()))?;
        }

        if sync_checkpoint {
            self.checkpoints.save(input.anchor_block_id, input.anchor_state_root);
        }
        self.records.insert(ctx.block_number, record.clone());
        *meta = next_meta;

        tracing::debug!(
            "Anchored L2 block {} to L1 block {} (excess {})",
            ctx.block_number,
            input.anchor_block_id,
            gas_excess
        );
        let _ = self.events.send(Anchored {
            block_number: ctx.block_number,
            anchor_block_id: input.anchor_block_id,
            public_input_hash,
            gas_excess,
        });

        Ok(record)
    }

    /// Anchor with a golden-touch signature; the recovered signer is the caller
    pub fn anchor_signed(
        &self,
        ctx: &L2Context,
        input: &AnchorInput,
        signature: &GoldenTouchSignature,
    ) -> Result<AnchorRecord, AnchorError> {
        let signer = signature.recover(input.signing_hash(ctx.block_number))?;
        self.anchor(signer, ctx, input)
    }

    /// Record for an anchored L2 block
    pub fn anchor_record(&self, block_number: u64) -> Option<AnchorRecord> {
        self.records.get(&block_number).map(|r| r.value().clone())
    }

    /// Record of the highest anchored L2 block
    pub fn last_anchor_record(&self) -> Option<AnchorRecord> {
        let head = self.meta.lock().head?;
        self.anchor_record(head)
    }

    /// Parent hash recorded by the anchor in `block_number + 1`
    pub fn l2_block_hash(&self, block_number: u64) -> Option<B256> {
        let child = block_number.checked_add(1)?;
        self.records.get(&child).map(|r| r.parent_hash)
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Newest synced `(l1_block_id, state_root)`
    pub fn last_synced_checkpoint(&self) -> Option<(u64, B256)> {
        let id = self.meta.lock().last_synced_block;
        self.checkpoints.get(id).map(|root| (id, root))
    }

    pub fn gas_excess(&self) -> u64 {
        self.meta.lock().gas_excess
    }

    pub fn anchored_blocks(&self) -> usize {
        self.records.len()
    }

    pub fn owner(&self) -> Address {
        self.owner.lock().owner()
    }

    pub fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<(), AnchorError> {
        self.owner.lock().transfer_ownership(caller, new_owner)?;
        Ok(())
    }

    fn save_metadata(&self, meta: &AnchorMetadata) -> Result<(), AnchorError> {
        match &self.store {
            Some(store) => store
                .save_metadata(meta)
                .and_then(|_| store.flush())
                .map_err(|e| AnchorError::Storage(e.to_string())),
            None => Ok(()),
        }
    }

    /// Credit native value to the anchor
    pub fn deposit(&self, amount: u128) -> Result<(), AnchorError> {
        let mut meta = self.meta.lock();
        let next = AnchorMetadata {
            balance: meta.balance.saturating_add(amount),
            ..meta.clone()
        };
        self.save_metadata(&next)?;
        *meta = next;
        Ok(())
    }

    pub fn balance(&self) -> u128 {
        self.meta.lock().balance
    }

    /// Drain the whole balance to `recipient` (owner only); returns the amount
    pub fn withdraw(&self, caller: Address, recipient: Address) -> Result<u128, AnchorError> {
        self.owner.lock().ensure_owner(caller)?;
        if recipient.is_zero() {
            return Err(AccessError::ZeroAddress.into());
        }

        let mut meta = self.meta.lock();
        let amount = meta.balance;
        let next = AnchorMetadata {
            balance: 0,
            ..meta.clone()
        };
        self.save_metadata(&next)?;
        *meta = next;

        tracing::info!("Withdrew {} to {}", amount, recipient);
        Ok(amount)
    }
}
