//! Verifier errors

use alloy_primitives::B256;
use l1_integration::AccessError;
use thiserror::Error;

/// Every way a proof can fail the gateway. All of them are terminal for the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("no transition context supplied")]
    EmptyBatch,

    #[error("aggregation not supported ({0} contexts supplied)")]
    AggregationNotSupported(usize),

    #[error("malformed proof encoding: {0}")]
    InvalidProofEncoding(String),

    #[error("image id {0} is not trusted")]
    InvalidImageId(B256),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error(transparent)]
    Access(#[from] AccessError),
}
