//! Ownership proofs for the stealth secret
//!
//! An [`OwnershipProof`] binds a stealth public key, a timestamp and a
//! caller-chosen message. The shipped [`SignatureOwnershipProver`] is an
//! ed25519 signature by the stealth key over that statement: it proves
//! knowledge of the secret and binds message and time, but it is NOT
//! zero-knowledge. A verifier learns nothing about the main wallet, yet the
//! proof is an ordinary signature checkable against the stealth key.
//!
//! A zero-knowledge backend implements [`OwnershipProver`] and plugs in
//! without touching the withdrawal flow.

use std::time::Duration;

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipProof {
    pub proof: [u8; 64],
    pub stealth_public_key: Pubkey,
    /// Unix milliseconds at proving time
    pub timestamp: i64,
    pub bound_message: String,
}

impl OwnershipProof {
    /// The exact bytes the proof commits to
    pub fn statement(&self) -> String {
        statement(&self.stealth_public_key, self.timestamp, &self.bound_message)
    }
}

fn statement(public_key: &Pubkey, timestamp: i64, message: &str) -> String {
    format!("nudge:ownership:{public_key}:{timestamp}:{message}")
}

/// Produces and checks ownership proofs.
///
/// `prove` may be slow (a real prover is CPU-bound); callers run it off the
/// async executor.
pub trait OwnershipProver: Send + Sync {
    fn prove(
        &self,
        secret: &[u8; 64],
        public_key: &Pubkey,
        bound_message: &str,
    ) -> Result<OwnershipProof, EngineError>;

    fn verify(&self, proof: &OwnershipProof) -> bool;
}

/// Signature-backed prover (reduced guarantee, see module docs)
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureOwnershipProver;

impl OwnershipProver for SignatureOwnershipProver {
    fn prove(
        &self,
        secret: &[u8; 64],
        public_key: &Pubkey,
        bound_message: &str,
    ) -> Result<OwnershipProof, EngineError> {
        let signer = Keypair::from_bytes(secret)
            .map_err(|_| EngineError::OwnershipProof("malformed stealth secret".to_string()))?;
        if signer.pubkey() != *public_key {
            return Err(EngineError::OwnershipProof(
                "secret does not match the stealth public key".to_string(),
            ));
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let message = statement(public_key, timestamp, bound_message);
        let signature = signer.sign_message(message.as_bytes());

        let mut proof = [0u8; 64];
        proof.copy_from_slice(signature.as_ref());

        Ok(OwnershipProof {
            proof,
            stealth_public_key: *public_key,
            timestamp,
            bound_message: bound_message.to_string(),
        })
    }

    fn verify(&self, proof: &OwnershipProof) -> bool {
        Signature::from(proof.proof).verify(
            proof.stealth_public_key.as_ref(),
            proof.statement().as_bytes(),
        )
    }
}

/// Verify a proof and require it to be bound to `expected_message` and no
/// older than `max_age`
pub fn verify_fresh(
    prover: &dyn OwnershipProver,
    proof: &OwnershipProof,
    expected_message: &str,
    max_age: Duration,
) -> bool {
    if proof.bound_message != expected_message || !prover.verify(proof) {
        return false;
    }
    let age_ms = chrono::Utc::now().timestamp_millis() - proof.timestamp;
    age_ms >= 0 && (age_ms as u128) <= max_age.as_millis()
}
