//! Rollup state machine - propose, prove and verify L2 blocks on L1

use crate::error::{LedgerError, RollupError};
use crate::ledger::{Block, Ledger, TransitionRef, TransitionState};
use crate::scheduler::should_verify_blocks;
use alloy_primitives::{keccak256, Address, B256};
use l1_integration::{BlockMetadata, Ownable, RollupConfig, TierProof, Transition};
use proof_verifier::{ProofContext, ProofVerifier};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Meta hash stored for the genesis block
pub const GENESIS_META_HASH: B256 = B256::with_last_byte(1);

/// The L1 block a call executes in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct L1Context {
    pub number: u64,
    pub timestamp: u64,
    /// Hash of block `number - 1`
    pub parent_hash: B256,
}

/// Proposer-supplied block parameters. Zero values take defaults from the L1 context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockParams {
    pub coinbase: Address,
    /// Defaults to the parent of the current L1 block
    pub anchor_block_id: u64,
    pub anchor_block_hash: B256,
    /// Defaults to the L1 timestamp
    pub timestamp: u64,
    /// Defaults to the configured maximum
    pub gas_limit: u32,
    pub tx_list_hash: B256,
    pub extra_data: B256,
}

/// Ledger lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RollupEvent {
    BlockProposed {
        block_id: u64,
        meta_hash: B256,
        proposer: Address,
    },
    TransitionProved {
        block_id: u64,
        tran: Transition,
        prover: Address,
        tier: u16,
    },
    TransitionContested {
        block_id: u64,
        tran: Transition,
        contester: Address,
        tier: u16,
    },
    BlockVerified {
        block_id: u64,
        block_hash: B256,
        state_root: B256,
        prover: Address,
    },
    StateRootSynced {
        block_id: u64,
        state_root: B256,
    },
}

/// Snapshot of ledger counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollupStats {
    pub num_blocks: u64,
    pub last_verified_block_id: u64,
    pub last_synced_block_id: u64,
    pub proving_paused: bool,
    pub verifiers: usize,
}

struct PendingVerification {
    block_id: u64,
    tid: u32,
    transition: TransitionState,
}

/// L1 rollup ledger
pub struct Rollup {
    config: RollupConfig,
    owner: Ownable,
    ledger: Ledger,
    verifiers: BTreeMap<u16, Arc<dyn ProofVerifier>>,
    num_blocks: u64,
    last_verified_block_id: u64,
    last_synced_block_id: u64,
    last_synced_state_root: B256,
    /// Parent link for the next proposal
    last_meta_hash: B256,
    last_anchor_block_id: u64,
    last_timestamp: u64,
    proving_paused: bool,
    events: broadcast::Sender<RollupEvent>,
}

impl Rollup {
    /// Create the ledger with a verified genesis block whose hash is `genesis_hash`
    pub fn new(config: RollupConfig, owner: Address, genesis_hash: B256) -> Result<Self, RollupError> {
        config.validate()?;
        if genesis_hash.is_zero() {
            return Err(RollupError::InvalidTransition);
        }

        let mut ledger = Ledger::new(config.block_ring_buffer_size);
        ledger.insert_block(Block::new(0, GENESIS_META_HASH, Address::ZERO, 0, 0));
        let tid = ledger.create_transition(0, B256::ZERO)?;
        ledger.transition_mut(0, tid)?.block_hash = genesis_hash;
        ledger.set_verified(0, tid)?;

        let (events, _) = broadcast::channel(1024);

        tracing::info!("Rollup genesis {} (chain {})", genesis_hash, config.l2_chain_id);

        Ok(Self {
            config,
            owner: Ownable::new(owner)?,
            ledger,
            verifiers: BTreeMap::new(),
            num_blocks: 1,
            last_verified_block_id: 0,
            last_synced_block_id: 0,
            last_synced_state_root: B256::ZERO,
            last_meta_hash: GENESIS_META_HASH,
            last_anchor_block_id: 0,
            last_timestamp: 0,
            proving_paused: false,
            events,
        })
    }

    /// Route proofs of `tier` to `verifier` (owner only)
    pub fn register_verifier(
        &mut self,
        caller: Address,
        tier: u16,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Result<(), RollupError> {
        self.owner.ensure_owner(caller)?;
        self.verifiers.insert(tier, verifier);
        tracing::info!("Registered verifier for tier {}", tier);
        Ok(())
    }

    /// Subscribe to ledger events
    pub fn subscribe(&self) -> broadcast::Receiver<RollupEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RollupEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Propose the next L2 block
    pub fn propose_block(
        &mut self,
        proposer: Address,
        params: BlockParams,
        l1: &L1Context,
    ) -> Result<BlockMetadata, RollupError> {
        if self.num_blocks >= self.last_verified_block_id + self.config.block_max_proposals + 1 {
            return Err(RollupError::TooManyBlocks {
                num_blocks: self.num_blocks,
                last_verified: self.last_verified_block_id,
            });
        }

        let (anchor_block_id, anchor_block_hash) = if params.anchor_block_id == 0 {
            (l1.number.saturating_sub(1), l1.parent_hash)
        } else {
            (params.anchor_block_id, params.anchor_block_hash)
        };
        if anchor_block_id >= l1.number
            || anchor_block_id + self.config.max_anchor_height_offset < l1.number
            || anchor_block_id < self.last_anchor_block_id
            || anchor_block_hash.is_zero()
        {
            return Err(RollupError::InvalidAnchorBlock(anchor_block_id));
        }

        let timestamp = if params.timestamp == 0 {
            l1.timestamp
        } else {
            params.timestamp
        };
        if timestamp > l1.timestamp || timestamp < self.last_timestamp {
            return Err(RollupError::InvalidTimestamp(timestamp));
        }

        let gas_limit = if params.gas_limit == 0 {
            self.config.block_max_gas_limit
        } else {
            params.gas_limit
        };
        if gas_limit > self.config.block_max_gas_limit {
            return Err(RollupError::InvalidGasLimit(gas_limit));
        }

        let block_id = self.num_blocks;

        // The new block has no transitions yet, so it cannot extend this sweep
        if should_verify_blocks(self.config.max_blocks_to_verify, block_id, true) {
            self.verify_blocks(self.config.max_blocks_to_verify)?;
        }

        let mut seed = [0u8; 16];
        seed[..8].copy_from_slice(&l1.number.to_be_bytes());
        seed[8..].copy_from_slice(&block_id.to_be_bytes());

        let meta = BlockMetadata {
            anchor_block_hash,
            difficulty: keccak256(seed),
            tx_list_hash: params.tx_list_hash,
            extra_data: params.extra_data,
            coinbase: params.coinbase,
            id: block_id,
            gas_limit,
            timestamp,
            anchor_block_id,
            parent_meta_hash: self.last_meta_hash,
            proposer,
            proposed_at: l1.timestamp,
            proposed_in: l1.number,
            base_fee_config: self.config.base_fee_config.clone(),
        };
        let meta_hash = meta.hash();

        self.ledger.insert_block(Block::new(
            block_id,
            meta_hash,
            proposer,
            l1.timestamp,
            l1.number,
        ));
        self.num_blocks += 1;
        self.last_meta_hash = meta_hash;
        self.last_anchor_block_id = anchor_block_id;
        self.last_timestamp = timestamp;

        tracing::debug!("Block {} proposed by {} (meta {})", block_id, proposer, meta_hash);
        self.emit(RollupEvent::BlockProposed {
            block_id,
            meta_hash,
            proposer,
        });

        Ok(meta)
    }

    /// Submit a tiered proof for one transition of an unverified block
    pub fn prove_block(
        &mut self,
        l1: &L1Context,
        prover: Address,
        meta: &BlockMetadata,
        tran: &Transition,
        proof: &TierProof,
    ) -> Result<(), RollupError> {
        if self.proving_paused {
            return Err(RollupError::ProvingPaused);
        }
        if !tran.is_complete() {
            return Err(RollupError::InvalidTransition);
        }

        let block_id = meta.id;
        if block_id <= self.last_verified_block_id || block_id >= self.num_blocks {
            return Err(LedgerError::InvalidBlockId(block_id).into());
        }

        let meta_hash = meta.hash();
        let (blk, _) = self.ledger.get_block(block_id)?;
        if blk.meta_hash != meta_hash {
            return Err(RollupError::BlockMismatch(block_id));
        }

        let verifier = self
            .verifiers
            .get(&proof.tier)
            .cloned()
            .ok_or(RollupError::InvalidTier(proof.tier))?;

        let existing_tid = self.ledger.get_transition_id(block_id, tran.parent_hash)?;
        let is_contesting = match existing_tid {
            0 => false,
            tid => {
                let existing = self.ledger.get_transition_by_index(block_id, tid)?;
                if proof.tier < existing.tier {
                    return Err(RollupError::InvalidTier(proof.tier));
                }
                if proof.tier == existing.tier {
                    if existing.block_hash == tran.block_hash && existing.state_root == tran.state_root {
                        return Err(RollupError::AlreadyProved(block_id));
                    }
                    if existing.is_contested() {
                        return Err(RollupError::AlreadyContested(block_id));
                    }
                    true
                } else {
                    false
                }
            }
        };

        let ctx = ProofContext {
            block_id,
            meta_hash,
            prover,
            msg_sender: prover,
            is_contesting,
            tran: tran.clone(),
        };
        verifier.verify_proof(std::slice::from_ref(&ctx), proof)?;

        let previous = match existing_tid {
            0 => None,
            tid => Some(self.ledger.get_transition_by_index(block_id, tid)?.clone()),
        };
        let tid = self.ledger.create_transition(block_id, tran.parent_hash)?;
        let ts = self.ledger.transition_mut(block_id, tid)?;
        ts.timestamp = l1.timestamp;
        if is_contesting {
            ts.contester = Some(prover);
        } else {
            ts.block_hash = tran.block_hash;
            ts.state_root = tran.state_root;
            ts.prover = prover;
            ts.tier = proof.tier;
            ts.contester = None;
        }

        let sweep = if should_verify_blocks(self.config.max_blocks_to_verify, block_id, false) {
            match self.plan_verification(self.config.max_blocks_to_verify) {
                Ok(pending) => pending,
                Err(e) => {
                    self.restore_transition(block_id, tid, previous);
                    return Err(e);
                }
            }
        } else {
            Vec::new()
        };

        if is_contesting {
            tracing::info!("Block {} transition contested by {} (tier {})", block_id, prover, proof.tier);
            self.emit(RollupEvent::TransitionContested {
                block_id,
                tran: tran.clone(),
                contester: prover,
                tier: proof.tier,
            });
        } else {
            tracing::info!("Block {} proved by {} (tier {}, tid {})", block_id, prover, proof.tier, tid);
            self.emit(RollupEvent::TransitionProved {
                block_id,
                tran: tran.clone(),
                prover,
                tier: proof.tier,
            });
        }

        self.apply_verification(sweep)?;
        Ok(())
    }

    /// Undo a transition write from a proof that could not complete
    fn restore_transition(&mut self, block_id: u64, tid: u32, previous: Option<TransitionState>) {
        let restored = match previous {
            Some(prev) => self.ledger.transition_mut(block_id, tid).map(|ts| *ts = prev),
            None => self.ledger.discard_transition(block_id, tid),
        };
        if let Err(e) = restored {
            tracing::error!("Failed to restore transition {} of block {}: {}", tid, block_id, e);
        }
    }

    /// Verify up to `max_blocks` consecutive blocks; returns how many were verified
    pub fn verify_blocks(&mut self, max_blocks: u64) -> Result<u64, RollupError> {
        let pending = self.plan_verification(max_blocks)?;
        self.apply_verification(pending)
    }

    /// Read pass of a sweep: the verifiable chain after the last verified block
    fn plan_verification(&self, max_blocks: u64) -> Result<Vec<PendingVerification>, RollupError> {
        let mut pending: Vec<PendingVerification> = Vec::new();
        if max_blocks == 0 {
            return Ok(pending);
        }

        let (tip, _) = self.ledger.get_block(self.last_verified_block_id)?;
        let mut block_hash = self
            .ledger
            .get_transition_by_index(tip.id, tip.verified_transition_id)?
            .block_hash;

        let mut block_id = self.last_verified_block_id + 1;
        while block_id < self.num_blocks && (pending.len() as u64) < max_blocks {
            let tid = self.ledger.get_transition_id(block_id, block_hash)?;
            if tid == 0 {
                break;
            }
            let transition = self.ledger.get_transition_by_index(block_id, tid)?;
            if transition.is_contested() {
                break;
            }

            block_hash = transition.block_hash;
            pending.push(PendingVerification {
                block_id,
                tid,
                transition: transition.clone(),
            });
            block_id += 1;
        }

        Ok(pending)
    }

    fn apply_verification(&mut self, pending: Vec<PendingVerification>) -> Result<u64, RollupError> {
        let Some(last) = pending.last() else {
            return Ok(0);
        };
        let (last_block_id, last_state_root) = (last.block_id, last.transition.state_root);

        for item in &pending {
            self.ledger.set_verified(item.block_id, item.tid)?;
            self.emit(RollupEvent::BlockVerified {
                block_id: item.block_id,
                block_hash: item.transition.block_hash,
                state_root: item.transition.state_root,
                prover: item.transition.prover,
            });
        }

        self.last_verified_block_id = last_block_id;
        tracing::info!("Verified {} block(s), last verified {}", pending.len(), last_block_id);

        let interval = self.config.state_root_sync_interval;
        if interval > 0 && last_block_id >= self.last_synced_block_id + interval {
            self.last_synced_block_id = last_block_id;
            self.last_synced_state_root = last_state_root;
            tracing::info!("State root {} synced at block {}", last_state_root, last_block_id);
            self.emit(RollupEvent::StateRootSynced {
                block_id: last_block_id,
                state_root: last_state_root,
            });
        }

        Ok(pending.len() as u64)
    }

    /// Pause or resume proving (owner only)
    pub fn pause_proving(&mut self, caller: Address, paused: bool) -> Result<(), RollupError> {
        self.owner.ensure_owner(caller)?;
        self.proving_paused = paused;
        tracing::info!("Proving paused: {}", paused);
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), RollupError> {
        self.owner.transfer_ownership(caller, new_owner)?;
        Ok(())
    }

    pub fn owner(&self) -> Address {
        self.owner.owner()
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    pub fn get_block(&self, block_id: u64) -> Result<&Block, RollupError> {
        Ok(self.ledger.get_block(block_id)?.0)
    }

    pub fn get_transition(
        &self,
        block_id: u64,
        by: impl Into<TransitionRef>,
    ) -> Result<&TransitionState, RollupError> {
        Ok(self.ledger.get_transition(block_id, by)?)
    }

    /// `(block_hash, state_root)` of a verified block, zeros otherwise
    pub fn get_block_info(&self, block_id: u64) -> Result<(B256, B256), RollupError> {
        Ok(self.ledger.get_block_info(block_id)?)
    }

    /// Most recently synced `(block_id, state_root)` checkpoint
    pub fn last_synced(&self) -> (u64, B256) {
        (self.last_synced_block_id, self.last_synced_state_root)
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    pub fn last_verified_block_id(&self) -> u64 {
        self.last_verified_block_id
    }

    pub fn stats(&self) -> RollupStats {
        RollupStats {
            num_blocks: self.num_blocks,
            last_verified_block_id: self.last_verified_block_id,
            last_synced_block_id: self.last_synced_block_id,
            proving_paused: self.proving_paused,
            verifiers: self.verifiers.len(),
        }
    }
}

/// Builder for Rollup
pub struct RollupBuilder {
    config: RollupConfig,
    owner: Address,
    genesis_hash: B256,
    verifiers: Vec<(u16, Arc<dyn ProofVerifier>)>,
}

impl RollupBuilder {
    pub fn new(owner: Address, genesis_hash: B256) -> Self {
        Self {
            config: RollupConfig::default(),
            owner,
            genesis_hash,
            verifiers: Vec::new(),
        }
    }

    pub fn config(mut self, config: RollupConfig) -> Self {
        self.config = config;
        self
    }

    pub fn verifier(mut self, tier: u16, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifiers.push((tier, verifier));
        self
    }

    pub fn build(self) -> Result<Rollup, RollupError> {
        let mut rollup = Rollup::new(self.config, self.owner, self.genesis_hash)?;
        for (tier, verifier) in self.verifiers {
            rollup.register_verifier(self.owner, tier, verifier)?;
        }
        Ok(rollup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l1_integration::{
        tiers::{TIER_GUARDIAN, TIER_ZKVM},
        AccessError,
    };
    use proof_verifier::VerifierError;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts everything, records what it saw
    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        contesting: AtomicUsize,
    }

    impl ProofVerifier for Recorder {
        fn verify_proof(&self, ctxs: &[ProofContext], _proof: &TierProof) -> Result<(), VerifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ctxs.iter().any(|c| c.is_contesting) {
                self.contesting.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct Refuse;

    impl ProofVerifier for Refuse {
        fn verify_proof(&self, _ctxs: &[ProofContext], _proof: &TierProof) -> Result<(), VerifierError> {
            Err(VerifierError::InvalidProof("refused".to_string()))
        }
    }

    fn owner() -> Address {
        Address::repeat_byte(0x0f)
    }

    fn proposer() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn prover() -> Address {
        Address::repeat_byte(0xb2)
    }

    fn genesis() -> B256 {
        B256::repeat_byte(0x01)
    }

    fn hash_of(block_id: u64) -> B256 {
        keccak256(block_id.to_be_bytes())
    }

    fn l1(number: u64) -> L1Context {
        L1Context {
            number,
            timestamp: 1_000 + number * 12,
            parent_hash: keccak256(number.saturating_sub(1).to_be_bytes()),
        }
    }

    fn config(ring: u64, proposals: u64, max_verify: u64) -> RollupConfig {
        RollupConfig {
            block_ring_buffer_size: ring,
            block_max_proposals: proposals,
            max_blocks_to_verify: max_verify,
            state_root_sync_interval: 4,
            ..Default::default()
        }
    }

    fn rollup_with(config: RollupConfig) -> (Rollup, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let rollup = RollupBuilder::new(owner(), genesis())
            .config(config)
            .verifier(TIER_ZKVM, recorder.clone())
            .verifier(TIER_GUARDIAN, recorder.clone())
            .build()
            .unwrap();
        (rollup, recorder)
    }

    fn propose(rollup: &mut Rollup, n: u64) -> BlockMetadata {
        rollup
            .propose_block(proposer(), BlockParams::default(), &l1(10 + n))
            .unwrap()
    }

    /// Transition for block `id` extending the canonical chain
    fn canonical(id: u64) -> Transition {
        let parent_hash = if id == 1 { genesis() } else { hash_of(id - 1) };
        Transition {
            parent_hash,
            block_hash: hash_of(id),
            state_root: B256::repeat_byte(id as u8),
            graffiti: B256::ZERO,
        }
    }

    fn prove(rollup: &mut Rollup, meta: &BlockMetadata, tran: &Transition, tier: u16) -> Result<(), RollupError> {
        rollup.prove_block(&l1(500), prover(), meta, tran, &TierProof::new(tier, vec![0u8]))
    }

    #[test]
    fn test_genesis_state() {
        let (rollup, _) = rollup_with(config(16, 8, 0));

        let blk = rollup.get_block(0).unwrap();
        assert_eq!(blk.next_transition_id, 2);
        assert_eq!(blk.verified_transition_id, 1);
        assert_eq!(rollup.num_blocks(), 1);
        assert_eq!(rollup.last_verified_block_id(), 0);
        assert_eq!(rollup.get_block_info(0).unwrap(), (genesis(), B256::ZERO));
        assert_eq!(rollup.get_transition(0, B256::ZERO).unwrap().block_hash, genesis());
    }

    #[test]
    fn test_metadata_chains_to_parent() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let first = propose(&mut rollup, 1);
        let second = propose(&mut rollup, 2);

        assert_eq!(first.id, 1);
        assert_eq!(first.parent_meta_hash, GENESIS_META_HASH);
        assert_eq!(second.parent_meta_hash, first.hash());
        assert_eq!(rollup.get_block(2).unwrap().meta_hash, second.hash());
        assert_eq!(first.anchor_block_id, 10);
        assert_eq!(first.gas_limit, rollup.config().block_max_gas_limit);
    }

    #[test]
    fn test_too_many_blocks() {
        let (mut rollup, _) = rollup_with(config(4, 3, 0));
        for n in 1..=3 {
            propose(&mut rollup, n);
        }

        let err = rollup
            .propose_block(proposer(), BlockParams::default(), &l1(20))
            .unwrap_err();
        assert_eq!(
            err,
            RollupError::TooManyBlocks {
                num_blocks: 4,
                last_verified: 0
            }
        );
    }

    #[test]
    fn test_invalid_anchor_timestamp_and_gas() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let ctx = l1(200);

        let stale = BlockParams {
            anchor_block_id: 100,
            anchor_block_hash: B256::repeat_byte(1),
            ..Default::default()
        };
        assert_eq!(
            rollup.propose_block(proposer(), stale, &ctx),
            Err(RollupError::InvalidAnchorBlock(100))
        );

        let future_anchor = BlockParams {
            anchor_block_id: 200,
            anchor_block_hash: B256::repeat_byte(1),
            ..Default::default()
        };
        assert_eq!(
            rollup.propose_block(proposer(), future_anchor, &ctx),
            Err(RollupError::InvalidAnchorBlock(200))
        );

        let future_ts = BlockParams {
            timestamp: ctx.timestamp + 1,
            ..Default::default()
        };
        assert_eq!(
            rollup.propose_block(proposer(), future_ts, &ctx),
            Err(RollupError::InvalidTimestamp(ctx.timestamp + 1))
        );

        let too_much_gas = BlockParams {
            gas_limit: rollup.config().block_max_gas_limit + 1,
            ..Default::default()
        };
        assert!(matches!(
            rollup.propose_block(proposer(), too_much_gas, &ctx),
            Err(RollupError::InvalidGasLimit(_))
        ));

        assert_eq!(rollup.num_blocks(), 1);
    }

    #[test]
    fn test_prove_and_verify_chain() {
        let (mut rollup, recorder) = rollup_with(config(16, 8, 0));
        let mut events = rollup.subscribe();
        let metas: Vec<_> = (1..=3).map(|n| propose(&mut rollup, n)).collect();

        for meta in &metas {
            prove(&mut rollup, meta, &canonical(meta.id), TIER_ZKVM).unwrap();
        }
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(rollup.last_verified_block_id(), 0);

        assert_eq!(rollup.verify_blocks(2).unwrap(), 2);
        assert_eq!(rollup.last_verified_block_id(), 2);
        assert_eq!(rollup.verify_blocks(10).unwrap(), 1);
        assert_eq!(rollup.get_block_info(3).unwrap(), (hash_of(3), B256::repeat_byte(3)));

        let verified = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, RollupEvent::BlockVerified { .. }))
            .count();
        assert_eq!(verified, 3);
    }

    #[test]
    fn test_sweep_stops_at_gap() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let metas: Vec<_> = (1..=3).map(|n| propose(&mut rollup, n)).collect();

        prove(&mut rollup, &metas[0], &canonical(1), TIER_ZKVM).unwrap();
        prove(&mut rollup, &metas[2], &canonical(3), TIER_ZKVM).unwrap();

        assert_eq!(rollup.verify_blocks(10).unwrap(), 1);
        assert_eq!(rollup.last_verified_block_id(), 1);
        assert_eq!(rollup.get_block_info(3).unwrap(), (B256::ZERO, B256::ZERO));
    }

    #[test]
    fn test_sweep_ignores_orphan_fork() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let metas: Vec<_> = (1..=2).map(|n| propose(&mut rollup, n)).collect();

        let mut orphan = canonical(2);
        orphan.parent_hash = B256::repeat_byte(0x77);
        prove(&mut rollup, &metas[0], &canonical(1), TIER_ZKVM).unwrap();
        prove(&mut rollup, &metas[1], &orphan, TIER_ZKVM).unwrap();

        assert_eq!(rollup.verify_blocks(10).unwrap(), 1);

        prove(&mut rollup, &metas[1], &canonical(2), TIER_ZKVM).unwrap();
        assert_eq!(rollup.get_block(2).unwrap().next_transition_id, 3);
        assert_eq!(rollup.verify_blocks(10).unwrap(), 1);
        assert_eq!(rollup.get_block(2).unwrap().verified_transition_id, 2);
    }

    #[test]
    fn test_prove_rejections() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let meta = propose(&mut rollup, 1);

        let mut wrong_meta = meta.clone();
        wrong_meta.extra_data = B256::repeat_byte(9);
        assert_eq!(
            prove(&mut rollup, &wrong_meta, &canonical(1), TIER_ZKVM),
            Err(RollupError::BlockMismatch(1))
        );

        let mut incomplete = canonical(1);
        incomplete.state_root = B256::ZERO;
        assert_eq!(
            prove(&mut rollup, &meta, &incomplete, TIER_ZKVM),
            Err(RollupError::InvalidTransition)
        );

        assert_eq!(
            prove(&mut rollup, &meta, &canonical(1), 7),
            Err(RollupError::InvalidTier(7))
        );

        let mut unknown = meta.clone();
        unknown.id = 5;
        assert_eq!(
            prove(&mut rollup, &unknown, &canonical(1), TIER_ZKVM),
            Err(RollupError::Ledger(LedgerError::InvalidBlockId(5)))
        );

        let genesis_meta = BlockMetadata::default();
        assert_eq!(
            prove(&mut rollup, &genesis_meta, &canonical(1), TIER_ZKVM),
            Err(RollupError::Ledger(LedgerError::InvalidBlockId(0)))
        );
    }

    #[test]
    fn test_rejected_proof_leaves_ledger_untouched() {
        let mut rollup = RollupBuilder::new(owner(), genesis())
            .config(config(16, 8, 2))
            .verifier(TIER_ZKVM, Arc::new(Refuse))
            .build()
            .unwrap();
        let meta = propose(&mut rollup, 1);

        assert!(matches!(
            prove(&mut rollup, &meta, &canonical(1), TIER_ZKVM),
            Err(RollupError::Verifier(VerifierError::InvalidProof(_)))
        ));
        assert_eq!(rollup.get_block(1).unwrap().next_transition_id, 1);
        assert_eq!(
            rollup.get_transition(1, genesis()),
            Err(RollupError::Ledger(LedgerError::TransitionNotFound(1)))
        );
    }

    #[test]
    fn test_tier_rules_and_contest() {
        let (mut rollup, recorder) = rollup_with(config(16, 8, 0));
        let mut events = rollup.subscribe();
        let meta = propose(&mut rollup, 1);
        let tran = canonical(1);

        prove(&mut rollup, &meta, &tran, TIER_ZKVM).unwrap();
        assert_eq!(
            prove(&mut rollup, &meta, &tran, TIER_ZKVM),
            Err(RollupError::AlreadyProved(1))
        );

        let mut rival = tran.clone();
        rival.block_hash = B256::repeat_byte(0xcc);
        prove(&mut rollup, &meta, &rival, TIER_ZKVM).unwrap();
        assert_eq!(recorder.contesting.load(Ordering::SeqCst), 1);

        let stored = rollup.get_transition(1, tran.parent_hash).unwrap();
        assert_eq!(stored.contester, Some(prover()));
        assert_eq!(stored.block_hash, tran.block_hash);
        assert_eq!(
            prove(&mut rollup, &meta, &rival, TIER_ZKVM),
            Err(RollupError::AlreadyContested(1))
        );

        // Contested transitions do not verify
        assert_eq!(rollup.verify_blocks(4).unwrap(), 0);

        // A higher tier settles the contest
        prove(&mut rollup, &meta, &rival, TIER_GUARDIAN).unwrap();
        let stored = rollup.get_transition(1, 1u32).unwrap();
        assert_eq!(stored.contester, None);
        assert_eq!(stored.block_hash, rival.block_hash);
        assert_eq!(stored.tier, TIER_GUARDIAN);

        assert_eq!(
            prove(&mut rollup, &meta, &tran, TIER_ZKVM),
            Err(RollupError::InvalidTier(TIER_ZKVM))
        );
        assert_eq!(rollup.verify_blocks(4).unwrap(), 1);

        let contested = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, RollupEvent::TransitionContested { .. }))
            .count();
        assert_eq!(contested, 1);
    }

    #[test]
    fn test_pause_proving_is_owner_only() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let meta = propose(&mut rollup, 1);

        assert_eq!(
            rollup.pause_proving(prover(), true),
            Err(RollupError::Access(AccessError::NotOwner(prover())))
        );
        rollup.pause_proving(owner(), true).unwrap();
        assert_eq!(
            prove(&mut rollup, &meta, &canonical(1), TIER_ZKVM),
            Err(RollupError::ProvingPaused)
        );

        rollup.pause_proving(owner(), false).unwrap();
        prove(&mut rollup, &meta, &canonical(1), TIER_ZKVM).unwrap();
        assert!(rollup.stats().verifiers >= 1);
    }

    #[test]
    fn test_register_verifier_is_owner_only() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        assert_eq!(
            rollup.register_verifier(prover(), 5, Arc::new(Refuse)),
            Err(RollupError::Access(AccessError::NotOwner(prover())))
        );
        rollup.transfer_ownership(owner(), prover()).unwrap();
        rollup.register_verifier(prover(), 5, Arc::new(Refuse)).unwrap();
        assert_eq!(rollup.stats().verifiers, 3);
    }

    #[test]
    fn test_scheduled_sweeps_and_state_root_sync() {
        // segment 2: proposals sweep on odd ids, proofs on even ids
        let (mut rollup, _) = rollup_with(config(32, 16, 4));
        let mut events = rollup.subscribe();

        for n in 1..=8 {
            let meta = propose(&mut rollup, n);
            prove(&mut rollup, &meta, &canonical(meta.id), TIER_ZKVM).unwrap();
        }

        assert_eq!(rollup.last_verified_block_id(), 8);
        let (synced_id, synced_root) = rollup.last_synced();
        assert_eq!(synced_id, 8);
        assert_eq!(synced_root, B256::repeat_byte(8));

        let syncs = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, RollupEvent::StateRootSynced { .. }))
            .count();
        assert_eq!(syncs, 2);
    }

    #[test]
    fn test_ring_wraps_after_verification() {
        let (mut rollup, _) = rollup_with(config(4, 3, 0));
        for n in 1..=10 {
            let meta = propose(&mut rollup, n);
            prove(&mut rollup, &meta, &canonical(meta.id), TIER_ZKVM).unwrap();
            rollup.verify_blocks(1).unwrap();
        }

        assert_eq!(rollup.last_verified_block_id(), 10);
        assert!(rollup.get_block(6).is_err());
        assert_eq!(rollup.get_block_info(10).unwrap().0, hash_of(10));
    }

    #[test]
    fn test_failed_sweep_fails_the_call() {
        let (mut rollup, _) = rollup_with(config(16, 8, 2));
        let first = propose(&mut rollup, 1);
        let second = propose(&mut rollup, 2);
        prove(&mut rollup, &first, &canonical(1), TIER_ZKVM).unwrap();
        assert_eq!(rollup.last_verified_block_id(), 1);

        // Stale index entry on the lookup the next sweep performs
        rollup.ledger.insert_index_entry(2, hash_of(1), 3);
        let corrupt = || RollupError::Ledger(LedgerError::UnexpectedTransitionId { block_id: 2, tid: 3 });
        let mut events = rollup.subscribe();

        assert_eq!(
            rollup.propose_block(proposer(), BlockParams::default(), &l1(13)),
            Err(corrupt())
        );
        assert_eq!(rollup.num_blocks(), 3);
        assert!(rollup.get_block(3).is_err());

        let mut orphan = canonical(2);
        orphan.parent_hash = B256::repeat_byte(0x77);
        assert_eq!(prove(&mut rollup, &second, &orphan, TIER_ZKVM), Err(corrupt()));
        assert_eq!(rollup.get_block(2).unwrap().next_transition_id, 1);
        assert_eq!(
            rollup.get_transition(2, orphan.parent_hash),
            Err(RollupError::Ledger(LedgerError::TransitionNotFound(2)))
        );

        assert_eq!(rollup.last_verified_block_id(), 1);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_failed_sweep_restores_overridden_transition() {
        let (mut rollup, _) = rollup_with(config(16, 8, 0));
        let first = propose(&mut rollup, 1);
        propose(&mut rollup, 2);
        prove(&mut rollup, &first, &canonical(1), TIER_ZKVM).unwrap();
        let before = rollup.get_transition(1, 1u32).unwrap().clone();

        // Sweep after every proof from here on
        rollup.config.max_blocks_to_verify = 2;
        let mut better = canonical(1);
        better.block_hash = B256::repeat_byte(0xdd);
        rollup.ledger.insert_index_entry(2, better.block_hash, 3);

        assert_eq!(
            prove(&mut rollup, &first, &better, TIER_GUARDIAN),
            Err(RollupError::Ledger(LedgerError::UnexpectedTransitionId { block_id: 2, tid: 3 }))
        );
        assert_eq!(rollup.get_transition(1, 1u32).unwrap(), &before);
        assert_eq!(rollup.get_block(1).unwrap().next_transition_id, 2);
        assert_eq!(rollup.last_verified_block_id(), 0);
    }

    proptest! {
        /// Interleaved proposals, proofs and sweeps never lose a block that is not yet verified
        #[test]
        fn prop_unverified_blocks_stay_readable(ops in proptest::collection::vec(0u8..3, 1..80)) {
            let (mut rollup, _) = rollup_with(config(6, 5, 0));
            let mut metas: BTreeMap<u64, BlockMetadata> = BTreeMap::new();
            let mut l1_number = 10u64;

            for op in ops {
                match op {
                    0 => {
                        l1_number += 1;
                        match rollup.propose_block(proposer(), BlockParams::default(), &l1(l1_number)) {
                            Ok(meta) => { metas.insert(meta.id, meta); }
                            Err(e) => prop_assert!(matches!(e, RollupError::TooManyBlocks { .. }), "unexpected error: {:?}", e),
                        }
                    }
                    1 => {
                        let next = rollup.last_verified_block_id() + 1;
                        let tran = canonical(next);
                        let unproved = rollup.get_transition(next, tran.parent_hash).is_err();
                        if let (Some(meta), true) = (metas.get(&next).cloned(), unproved) {
                            prove(&mut rollup, &meta, &tran, TIER_ZKVM).unwrap();
                        }
                    }
                    _ => { rollup.verify_blocks(2).unwrap(); }
                }

                let last = rollup.last_verified_block_id();
                let num_blocks = rollup.num_blocks();
                prop_assert!(num_blocks <= last + 5 + 1);
                for id in last..num_blocks {
                    prop_assert_eq!(rollup.get_block(id).unwrap().id, id);
                }
                for id in 0..num_blocks + 6 {
                    let readable = id < num_blocks && id + 6 >= num_blocks;
                    prop_assert_eq!(rollup.get_block(id).is_ok(), readable);
                }
            }
        }
    }
}
