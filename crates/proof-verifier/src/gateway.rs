//! Image-keyed proof gateway
//!
//! Proof data is `abi.encode(bytes seal, bytes32 imageId)`. The journal digest
//! handed to the checker is `sha256(JOURNAL_HEADER || publicInputHash)`.

use crate::{
    checker::ProofChecker, context::ProofContext, error::VerifierError, registry::ImageRegistry,
    ProofVerifier, JOURNAL_HEADER,
};
use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::{sol_data, SolType};
use l1_integration::{hash_public_inputs, TierProof};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

type ProofPayload = (sol_data::Bytes, sol_data::FixedBytes<32>);

/// Emitted once per accepted proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofVerified {
    pub meta_hash: B256,
    pub public_input_hash: B256,
}

/// Split proof data into `(seal, image_id)`; malformed data is rejected outright
pub fn decode_proof(data: &[u8]) -> Result<(Bytes, B256), VerifierError> {
    ProofPayload::abi_decode_params_validate(data)
        .map_err(|e| VerifierError::InvalidProofEncoding(e.to_string()))
}

/// Encode a seal and image id into proof data
pub fn encode_proof(seal: &Bytes, image_id: B256) -> Bytes {
    ProofPayload::abi_encode_params(&(seal.clone(), image_id)).into()
}

/// Journal digest for a public input hash
pub fn journal_digest(public_input_hash: B256) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(JOURNAL_HEADER);
    hasher.update(public_input_hash);
    B256::from_slice(&hasher.finalize())
}

/// Gateway for one zkVM proof system
pub struct ImageVerifier<C> {
    /// This verifier's own address (part of the public inputs)
    address: Address,
    /// L2 chain id (part of the public inputs)
    chain_id: u64,
    registry: ImageRegistry,
    checker: C,
    events: broadcast::Sender<ProofVerified>,
}

impl<C: ProofChecker> ImageVerifier<C> {
    pub fn new(address: Address, chain_id: u64, registry: ImageRegistry, checker: C) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            address,
            chain_id,
            registry,
            checker,
            events,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> &ImageRegistry {
        &self.registry
    }

    /// Subscribe to accepted proofs
    pub fn subscribe(&self) -> broadcast::Receiver<ProofVerified> {
        self.events.subscribe()
    }

    /// Public input hash this verifier expects for `ctx`
    pub fn public_input_hash(&self, ctx: &ProofContext) -> B256 {
        hash_public_inputs(
            &ctx.tran,
            self.address,
            Address::ZERO,
            ctx.prover,
            ctx.meta_hash,
            self.chain_id,
        )
    }

    fn verify_single(&self, ctx: &ProofContext, proof: &TierProof) -> Result<(), VerifierError> {
        if ctx.is_contesting {
            tracing::debug!("Skipping proof check for contested block {}", ctx.block_id);
            return Ok(());
        }

        let (seal, image_id) = decode_proof(&proof.data)?;

        if !self.registry.is_trusted(&image_id) {
            return Err(VerifierError::InvalidImageId(image_id));
        }

        let public_input_hash = self.public_input_hash(ctx);
        let digest = journal_digest(public_input_hash);

        match self.checker.verify(&seal, image_id, digest) {
            Ok(true) => {}
            Ok(false) => {
                return Err(VerifierError::InvalidProof(format!(
                    "seal rejected for block {}",
                    ctx.block_id
                )))
            }
            Err(e) => return Err(VerifierError::InvalidProof(e.to_string())),
        }

        tracing::info!(
            "Proof verified for block {} (meta {}, pi {}, sender {})",
            ctx.block_id,
            ctx.meta_hash,
            public_input_hash,
            ctx.msg_sender
        );

        // No subscribers is fine
        let _ = self.events.send(ProofVerified {
            meta_hash: ctx.meta_hash,
            public_input_hash,
        });

        Ok(())
    }
}

impl<C: ProofChecker> ProofVerifier for ImageVerifier<C> {
    fn verify_proof(&self, ctxs: &[ProofContext], proof: &TierProof) -> Result<(), VerifierError> {
        match ctxs {
            [] => Err(VerifierError::EmptyBatch),
            [ctx] => self.verify_single(ctx, proof),
            _ => Err(VerifierError::AggregationNotSupported(ctxs.len())),
        }
    }
}
