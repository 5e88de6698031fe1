//! Stealth identity derivation
//!
//! A stealth keypair is derived from the main wallet's signature over a
//! fixed message. Wallet signatures are deterministic ed25519, so the same
//! wallet always gets the same stealth identity back and nothing needs to
//! be stored.
//!
//! Security:
//! - The secret is zeroized on drop
//! - Clone is NOT derived to prevent accidental copies
//! - Debug output never includes secret bytes

use ed25519_dalek::{PublicKey as DalekPublicKey, SecretKey as DalekSecretKey};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use zeroize::Zeroize;

use crate::error::EngineError;

/// Message the main wallet signs to derive its stealth identity
pub const STEALTH_DERIVATION_MESSAGE: &str = "Sign to derive your Nudge stealth key.";

/// Bytes of the wallet signature used as the ed25519 seed
const SEED_LEN: usize = 32;

// ============================================================================
// Stealth Keypair
// ============================================================================

/// A one-time payment identity
pub struct StealthKeypair {
    public_key: Pubkey,
    /// seed || public key, the standard Solana keypair layout
    secret: [u8; 64],
}

impl StealthKeypair {
    pub fn public_key(&self) -> Pubkey {
        self.public_key
    }

    /// Raw 64-byte secret (use carefully)
    pub fn secret_key(&self) -> &[u8; 64] {
        &self.secret
    }

    /// A transaction signer for this identity
    pub fn to_signer(&self) -> Result<Keypair, EngineError> {
        Keypair::from_bytes(&self.secret)
            .map_err(|_| EngineError::TransactionBuild("stealth keypair is malformed".to_string()))
    }
}

impl Drop for StealthKeypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl std::fmt::Debug for StealthKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthKeypair")
            .field("public_key", &self.public_key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Derivation
// ============================================================================

/// Derive the stealth keypair from a wallet signature.
///
/// Only the first 32 bytes are used. Shorter inputs are rejected.
pub fn derive_stealth_keypair(signature: &[u8]) -> Result<StealthKeypair, EngineError> {
    if signature.len() < SEED_LEN {
        return Err(EngineError::InvalidSignature(signature.len()));
    }

    let secret = DalekSecretKey::from_bytes(&signature[..SEED_LEN])
        .map_err(|_| EngineError::InvalidSignature(signature.len()))?;
    let public = DalekPublicKey::from(&secret);

    let mut bytes = [0u8; 64];
    bytes[..SEED_LEN].copy_from_slice(secret.as_bytes());
    bytes[SEED_LEN..].copy_from_slice(public.as_bytes());

    Ok(StealthKeypair {
        public_key: Pubkey::new_from_array(public.to_bytes()),
        secret: bytes,
    })
}

/// Shorten an address for display: `Abc1...Xyz9`
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;

    #[test]
    fn test_derivation_is_deterministic() {
        let signature = [7u8; 64];
        let first = derive_stealth_keypair(&signature).unwrap();
        let second = derive_stealth_keypair(&signature).unwrap();

        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(first.secret_key(), second.secret_key());
    }

    #[test]
    fn test_only_first_32_bytes_matter() {
        let mut a = [1u8; 64];
        let mut b = [1u8; 64];
        a[40] = 0xAA;
        b[63] = 0x55;

        let ka = derive_stealth_keypair(&a).unwrap();
        let kb = derive_stealth_keypair(&b).unwrap();
        assert_eq!(ka.public_key(), kb.public_key());

        let exact = derive_stealth_keypair(&a[..32]).unwrap();
        assert_eq!(exact.public_key(), ka.public_key());
    }

    #[test]
    fn test_short_signature_rejected() {
        let err = derive_stealth_keypair(&[0u8; 31]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignature(31)));

        assert!(derive_stealth_keypair(&[]).is_err());
    }

    #[test]
    fn test_secret_layout_is_seed_then_public_key() {
        let signature = [42u8; 64];
        let keypair = derive_stealth_keypair(&signature).unwrap();

        let secret = keypair.secret_key();
        assert_eq!(&secret[..32], &signature[..32]);
        assert_eq!(&secret[32..], keypair.public_key().as_ref());
    }

    #[test]
    fn test_signer_matches_public_key() {
        let keypair = derive_stealth_keypair(&[9u8; 64]).unwrap();
        let signer = keypair.to_signer().unwrap();
        assert_eq!(signer.pubkey(), keypair.public_key());

        let message = b"withdraw";
        let signature = signer.sign_message(message);
        assert!(signature.verify(keypair.public_key().as_ref(), message));
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let keypair = derive_stealth_keypair(&[3u8; 64]).unwrap();
        let debug = format!("{keypair:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&format!("{:?}", keypair.secret_key())));
    }

    #[test]
    fn test_truncate_address() {
        assert_eq!(
            truncate_address("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"),
            "7xKX...gAsU"
        );
        assert_eq!(truncate_address("short"), "short");
    }
}
