//! Devnet driver - one simulated L1 and L2 in a single process
//!
//! Every tick anchors a new L2 block with the golden-touch signer, proposes it
//! on L1 and proves it with a dev-mode seal.

use crate::config::NodeConfig;
use alloy_primitives::{keccak256, Address, B256};
use l1_integration::{tiers::TIER_ZKVM, TierProof, Transition};
use l1_rollup::{BlockParams, L1Context, Rollup, RollupBuilder, RollupStats};
use l2_runtime::{
    AnchorInput, AnchorRecord, GoldenTouchSignature, GoldenTouchSigner, L2Anchor, L2Context,
    DEFAULT_NONCE_SELECTOR,
};
use proof_verifier::{
    encode_proof, journal_digest, DevModeChecker, ImageRegistry, ImageVerifier, ProofContext,
};
use serde::Serialize;
use std::sync::Arc;

const L1_BLOCK_TIME: u64 = 12;

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub l2_block: u64,
    pub rollup_block: u64,
    pub last_verified: u64,
}

/// Printed on shutdown
#[derive(Debug, Serialize)]
pub struct DevnetSummary {
    pub rollup: RollupStats,
    pub l2_head: u64,
    pub anchored_blocks: usize,
    pub gas_excess: u64,
    pub last_synced_checkpoint: Option<(u64, B256)>,
}

/// Deterministic stand-in for L2 execution
fn l2_block_hash(parent_hash: B256, block_number: u64, public_input_hash: B256) -> B256 {
    let mut preimage = Vec::with_capacity(72);
    preimage.extend_from_slice(parent_hash.as_slice());
    preimage.extend_from_slice(&block_number.to_be_bytes());
    preimage.extend_from_slice(public_input_hash.as_slice());
    keccak256(preimage)
}

fn l1_block_hash(number: u64) -> B256 {
    keccak256(number.to_be_bytes())
}

pub struct Devnet {
    rollup: Rollup,
    anchor: L2Anchor,
    signer: GoldenTouchSigner,
    gateway: Arc<ImageVerifier<DevModeChecker>>,
    image_id: B256,
    prover: Address,
    proposer: Address,
    l1_number: u64,
    l1_timestamp: u64,
    l2_number: u64,
    l2_head: B256,
    state_root: B256,
}

impl Devnet {
    pub fn new(config: &NodeConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let signer = GoldenTouchSigner::new()?;
        let base_fee_config = &config.rollup.base_fee_config;
        let anchor = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                L2Anchor::open(dir.join("anchor"), signer.address(), config.owner, base_fee_config)?
            }
            None => L2Anchor::new(signer.address(), config.owner, base_fee_config)?,
        };

        // Resume after the last anchored block, re-deriving its hash
        let (l2_number, l2_head, l1_number) = match anchor.last_anchor_record() {
            Some(last) => {
                tracing::info!("Resuming after L2 block {}", last.block_number);
                (
                    last.block_number,
                    l2_block_hash(last.parent_hash, last.block_number, last.public_input_hash),
                    last.anchor_block_id + 1,
                )
            }
            None => (0, config.genesis_hash, 1),
        };

        let registry = ImageRegistry::new(config.owner)?;
        for image in &config.trusted_images {
            registry.set_image_id_trusted(config.owner, *image, true)?;
        }
        let gateway = Arc::new(ImageVerifier::new(
            config.verifier_address,
            config.rollup.l2_chain_id,
            registry,
            DevModeChecker::new(),
        ));

        let rollup = RollupBuilder::new(config.owner, l2_head)
            .config(config.rollup.clone())
            .verifier(TIER_ZKVM, gateway.clone())
            .build()?;

        let l1_timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();

        Ok(Self {
            rollup,
            anchor,
            signer,
            gateway,
            image_id: config.trusted_images[0],
            prover: Address::with_last_byte(0xb2),
            proposer: Address::with_last_byte(0xa1),
            l1_number,
            l1_timestamp,
            l2_number,
            l2_head,
            state_root: keccak256(l2_head),
        })
    }

    pub fn rollup(&self) -> &Rollup {
        &self.rollup
    }

    pub fn anchor(&self) -> &L2Anchor {
        &self.anchor
    }

    /// Sign with the default nonce, falling back to the other one
    fn sign_anchor(&self, digest: B256) -> anyhow::Result<GoldenTouchSignature> {
        for k in [DEFAULT_NONCE_SELECTOR, 2] {
            let sig = self.signer.sign(digest, k)?;
            if sig.recover(digest)? == self.signer.address() {
                return Ok(sig);
            }
            tracing::warn!("Golden touch selector {} did not recover, retrying", k);
        }
        anyhow::bail!("no golden touch selector produced a valid signature")
    }

    fn anchor_next(&self, l1: &L1Context, parent_gas_used: u32) -> anyhow::Result<AnchorRecord> {
        let ctx = L2Context {
            block_number: self.l2_number + 1,
            parent_hash: self.l2_head,
            timestamp: l1.timestamp,
        };
        let anchor_block_id = l1.number - 1;
        let input = AnchorInput {
            anchor_block_id,
            anchor_state_root: keccak256(l1_block_hash(anchor_block_id)),
            parent_gas_used,
            base_fee_config: self.rollup.config().base_fee_config.clone(),
        };

        let sig = self.sign_anchor(input.signing_hash(ctx.block_number))?;
        Ok(self.anchor.anchor_signed(&ctx, &input, &sig)?)
    }

    /// Anchor, propose and prove one block
    pub fn tick(&mut self) -> anyhow::Result<TickReport> {
        self.l1_number += 1;
        self.l1_timestamp += L1_BLOCK_TIME;
        let l1 = L1Context {
            number: self.l1_number,
            timestamp: self.l1_timestamp,
            parent_hash: l1_block_hash(self.l1_number - 1),
        };

        let parent_gas_used = 1_000_000 + (self.l2_number % 7) as u32 * 500_000;
        let record = self.anchor_next(&l1, parent_gas_used)?;

        let parent_hash = self.l2_head;
        let block_hash = l2_block_hash(parent_hash, record.block_number, record.public_input_hash);
        let state_root = keccak256([self.state_root.as_slice(), block_hash.as_slice()].concat());

        // The L2 block exists once anchored, whatever happens on L1
        self.l2_number = record.block_number;
        self.l2_head = block_hash;
        self.state_root = state_root;

        let meta = self.rollup.propose_block(
            self.proposer,
            BlockParams {
                coinbase: self.proposer,
                tx_list_hash: keccak256(record.block_number.to_be_bytes()),
                ..Default::default()
            },
            &l1,
        )?;

        let tran = Transition {
            parent_hash,
            block_hash,
            state_root,
            graffiti: B256::ZERO,
        };
        let ctx = ProofContext {
            block_id: meta.id,
            meta_hash: meta.hash(),
            prover: self.prover,
            msg_sender: self.prover,
            is_contesting: false,
            tran: tran.clone(),
        };
        let digest = journal_digest(self.gateway.public_input_hash(&ctx));
        let seal = DevModeChecker::seal_for(self.image_id, digest);
        let proof = TierProof::new(TIER_ZKVM, encode_proof(&seal, self.image_id));
        self.rollup.prove_block(&l1, self.prover, &meta, &tran, &proof)?;

        tracing::debug!(
            "Tick: L2 block {} -> rollup block {} (meta {})",
            record.block_number,
            meta.id,
            meta.hash()
        );

        Ok(TickReport {
            l2_block: record.block_number,
            rollup_block: meta.id,
            last_verified: self.rollup.last_verified_block_id(),
        })
    }

    pub fn summary(&self) -> DevnetSummary {
        DevnetSummary {
            rollup: self.rollup.stats(),
            l2_head: self.l2_number,
            anchored_blocks: self.anchor.anchored_blocks(),
            gas_excess: self.anchor.gas_excess(),
            last_synced_checkpoint: self.anchor.last_synced_checkpoint(),
        }
    }
}
