//! Golden-touch signer
//!
//! The anchor transaction is signed by a well-known key using one of two fixed
//! nonces (k = 1 or k = 2), so any node can produce the same signature for the
//! same digest. The key is public; what matters is that the recovered signer is
//! the designated anchor authority.

use alloy_primitives::{address, b256, Address, B256};
use k256::{
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
    elliptic_curve::{ops::Reduce, point::AffineCoordinates},
    FieldBytes, ProjectivePoint, Scalar, U256,
};
use thiserror::Error;

/// Well-known private key of the anchor authority
pub const GOLDEN_TOUCH_PRIVATE_KEY: B256 =
    b256!("92954368afd3caa1f3ce3ead0069c1af414054aefe1ef9aeacc1bf426222ce38");

/// Address derived from [`GOLDEN_TOUCH_PRIVATE_KEY`]
pub const GOLDEN_TOUCH_ADDRESS: Address = address!("0000777735367b36bC9B61C50022d9D0700dB4Ec");

/// Signer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("invalid golden touch selector {0}")]
    InvalidGoldenTouchSelector(u8),

    #[error("signature error: {0}")]
    Signature(String),
}

/// Which fixed nonce to sign with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSelector {
    One,
    Two,
}

impl NonceSelector {
    fn scalar(self) -> Scalar {
        match self {
            NonceSelector::One => Scalar::ONE,
            NonceSelector::Two => Scalar::from(2u64),
        }
    }
}

impl TryFrom<u8> for NonceSelector {
    type Error = SignerError;

    fn try_from(k: u8) -> Result<Self, Self::Error> {
        match k {
            1 => Ok(NonceSelector::One),
            2 => Ok(NonceSelector::Two),
            other => Err(SignerError::InvalidGoldenTouchSelector(other)),
        }
    }
}

/// Recoverable secp256k1 signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoldenTouchSignature {
    pub r: B256,
    pub s: B256,
    /// Ethereum-style recovery byte (27 or 28)
    pub v: u8,
}

impl GoldenTouchSignature {
    /// Recover the address that produced this signature over `digest`
    pub fn recover(&self, digest: B256) -> Result<Address, SignerError> {
        let recovery_id = self
            .v
            .checked_sub(27)
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| SignerError::Signature(format!("invalid recovery byte {}", self.v)))?;

        let signature = Signature::from_scalars(FieldBytes::from(self.r.0), FieldBytes::from(self.s.0))
            .map_err(|e| SignerError::Signature(e.to_string()))?;

        let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
            .map_err(|e| SignerError::Signature(e.to_string()))?;

        Ok(address_of(&key))
    }
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    Address::from_raw_public_key(&point.as_bytes()[1..])
}

/// The designated anchor authority
pub struct GoldenTouchSigner {
    key: SigningKey,
    address: Address,
}

impl GoldenTouchSigner {
    pub fn new() -> Result<Self, SignerError> {
        let key = SigningKey::from_bytes(&FieldBytes::from(GOLDEN_TOUCH_PRIVATE_KEY.0))
            .map_err(|e| SignerError::Signature(e.to_string()))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Address every valid anchor signature recovers to
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `digest` with the fixed nonce picked by `k` (1 or 2)
    pub fn sign(&self, digest: B256, k: u8) -> Result<GoldenTouchSignature, SignerError> {
        let nonce = NonceSelector::try_from(k)?.scalar();

        let big_r = (ProjectivePoint::GENERATOR * nonce).to_affine();
        let r = <Scalar as Reduce<U256>>::reduce_bytes(&big_r.x());
        let z = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(digest.0));
        let d: Scalar = **self.key.as_nonzero_scalar();

        let nonce_inv = Option::<Scalar>::from(nonce.invert())
            .ok_or_else(|| SignerError::Signature("nonce not invertible".to_string()))?;
        let s = nonce_inv * (z + r * d);

        let signature = Signature::from_scalars(r.to_bytes(), s.to_bytes())
            .map_err(|e| SignerError::Signature(e.to_string()))?;

        // Low-s form flips the parity of R
        let mut y_odd = bool::from(big_r.y_is_odd());
        let signature = match signature.normalize_s() {
            Some(low) => {
                y_odd = !y_odd;
                low
            }
            None => signature,
        };

        let (r, s) = signature.split_bytes();
        Ok(GoldenTouchSignature {
            r: B256::from_slice(&r),
            s: B256::from_slice(&s),
            v: 27 + u8::from(y_odd),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    fn signer() -> GoldenTouchSigner {
        GoldenTouchSigner::new().unwrap()
    }

    #[test]
    fn test_key_derives_well_known_address() {
        assert_eq!(signer().address(), GOLDEN_TOUCH_ADDRESS);
    }

    #[test]
    fn test_both_selectors_recover_to_authority() {
        let signer = signer();
        for n in 0..16u8 {
            let digest = keccak256([n]);
            for k in [1u8, 2] {
                let sig = signer.sign(digest, k).unwrap();
                assert_eq!(sig.recover(digest).unwrap(), signer.address());
            }
        }
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let signer = signer();
        let digest = keccak256(b"anchor");

        assert_eq!(signer.sign(digest, 1).unwrap(), signer.sign(digest, 1).unwrap());
        assert_ne!(signer.sign(digest, 1).unwrap(), signer.sign(digest, 2).unwrap());
    }

    #[test]
    fn test_r_is_generator_multiple() {
        let signer = signer();
        let digest = keccak256(b"r");

        // x coordinate of G
        let gx = b256!("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
        assert_eq!(signer.sign(digest, 1).unwrap().r, gx);
    }

    #[test]
    fn test_other_selectors_rejected() {
        let signer = signer();
        let digest = keccak256(b"x");
        for k in [0u8, 3, 27, 255] {
            assert_eq!(
                signer.sign(digest, k),
                Err(SignerError::InvalidGoldenTouchSelector(k))
            );
        }
    }

    #[test]
    fn test_signature_bound_to_digest() {
        let signer = signer();
        let sig = signer.sign(keccak256(b"a"), 1).unwrap();

        if let Ok(address) = sig.recover(keccak256(b"b")) {
            assert_ne!(address, signer.address());
        }
    }

    #[test]
    fn test_invalid_recovery_byte() {
        let signer = signer();
        let digest = keccak256(b"v");
        let mut sig = signer.sign(digest, 2).unwrap();
        sig.v = 5;
        assert!(matches!(sig.recover(digest), Err(SignerError::Signature(_))));
    }
}
