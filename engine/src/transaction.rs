//! Multi-signer v0 transactions
//!
//! A withdrawal is signed by two parties that are usually not in the same
//! place: the stealth key (held by the engine's caller) and the fee payer
//! (the main wallet). [`UnsignedTransaction`] keeps one slot per required
//! signer and accepts signatures in any order.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    message: VersionedMessage,
    signatures: Vec<Option<Signature>>,
}

impl UnsignedTransaction {
    /// Compile `instructions` into a v0 message paid for by `payer`
    pub fn compile(
        payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: Hash,
    ) -> Result<Self, EngineError> {
        let message = v0::Message::try_compile(payer, instructions, &[], recent_blockhash)
            .map_err(|e| EngineError::TransactionBuild(format!("failed to compile message: {e}")))?;
        let required = usize::from(message.header.num_required_signatures);

        Ok(Self {
            message: VersionedMessage::V0(message),
            signatures: vec![None; required],
        })
    }

    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn payer(&self) -> Pubkey {
        self.message.static_account_keys()[0]
    }

    pub fn recent_blockhash(&self) -> Hash {
        *self.message.recent_blockhash()
    }

    /// Signers in signature-slot order; the fee payer comes first
    pub fn required_signers(&self) -> &[Pubkey] {
        &self.message.static_account_keys()[..self.signatures.len()]
    }

    fn slot_of(&self, pubkey: &Pubkey) -> Result<usize, EngineError> {
        self.required_signers()
            .iter()
            .position(|key| key == pubkey)
            .ok_or_else(|| {
                EngineError::TransactionBuild(format!("{pubkey} is not a required signer"))
            })
    }

    /// Sign with one of the required signers
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<(), EngineError> {
        let pubkey = signer.try_pubkey().map_err(|e| {
            EngineError::TransactionBuild(format!("signer unavailable: {e}"))
        })?;
        let slot = self.slot_of(&pubkey)?;
        let signature = signer
            .try_sign_message(&self.message.serialize())
            .map_err(|e| EngineError::TransactionBuild(format!("signing failed: {e}")))?;
        self.signatures[slot] = Some(signature);
        Ok(())
    }

    /// Attach a signature produced elsewhere (e.g. by a wallet); it must
    /// verify against this message
    pub fn add_signature(&mut self, pubkey: &Pubkey, signature: Signature) -> Result<(), EngineError> {
        let slot = self.slot_of(pubkey)?;
        if !signature.verify(pubkey.as_ref(), &self.message.serialize()) {
            return Err(EngineError::InvalidInput(format!(
                "signature does not verify for {pubkey}"
            )));
        }
        self.signatures[slot] = Some(signature);
        Ok(())
    }

    pub fn missing_signers(&self) -> Vec<Pubkey> {
        self.required_signers()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, signature)| signature.is_none())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(Option::is_some)
    }

    /// Transaction with whatever signatures are present; empty slots hold
    /// the default signature
    pub fn to_versioned(&self) -> VersionedTransaction {
        VersionedTransaction {
            signatures: self
                .signatures
                .iter()
                .map(|signature| signature.unwrap_or_default())
                .collect(),
            message: self.message.clone(),
        }
    }

    /// Finished transaction; fails unless every required signer has signed
    pub fn into_signed(self) -> Result<VersionedTransaction, EngineError> {
        let missing = self.signatures.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            return Err(EngineError::IncompleteSignatures { missing });
        }
        Ok(self.to_versioned())
    }

    /// Wire form handed to wallets for signing
    pub fn serialize_base64(&self) -> Result<String, EngineError> {
        let bytes = bincode::serialize(&self.to_versioned())
            .map_err(|e| EngineError::TransactionBuild(format!("failed to serialize: {e}")))?;
        Ok(BASE64.encode(bytes))
    }
}
