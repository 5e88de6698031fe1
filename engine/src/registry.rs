//! Payment confirmation
//!
//! After a sender's deposit lands, the payee's side records it against the
//! payment link it was made through. The engine only checks the claim
//! against the ledger; storage belongs to a [`PaymentRecorder`].

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::info;

use crate::connection::LedgerConnections;
use crate::error::EngineError;

/// Claim submitted by a client after sending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub link_id: String,
    /// SOL
    pub amount: f64,
    #[serde(rename = "sender")]
    pub sender_address: String,
    #[serde(rename = "signature")]
    pub transaction_signature: String,
}

/// A claim that checked out against the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedPayment {
    pub link_id: String,
    pub amount: f64,
    pub sender: String,
    pub signature: String,
    /// Unix milliseconds
    pub confirmed_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// The signature was already recorded; nothing changed
    Duplicate,
}

#[async_trait]
pub trait PaymentRecorder: Send + Sync {
    async fn is_recorded(&self, signature: &str) -> Result<bool, EngineError>;

    async fn record(&self, payment: &ConfirmedPayment) -> Result<RecordOutcome, EngineError>;
}

struct ValidClaim {
    sender: Pubkey,
    signature: Signature,
}

fn validate(claim: &PaymentConfirmation) -> Result<ValidClaim, EngineError> {
    if claim.link_id.trim().is_empty() || claim.transaction_signature.trim().is_empty() {
        return Err(EngineError::InvalidInput("Missing required fields".to_string()));
    }
    if !claim.amount.is_finite() || claim.amount <= 0.0 {
        return Err(EngineError::InvalidAmount);
    }
    let sender = Pubkey::from_str(&claim.sender_address)
        .map_err(|_| EngineError::InvalidAddress(claim.sender_address.clone()))?;
    let signature = Signature::from_str(&claim.transaction_signature)
        .map_err(|_| EngineError::InvalidInput("Invalid transaction signature".to_string()))?;
    Ok(ValidClaim { sender, signature })
}

/// Check `claim` against the ledger and hand it to `recorder`.
///
/// The transaction must be confirmed without error and list the sender
/// among its account keys. A signature that is already recorded is
/// reported as a duplicate without asking the ledger again.
pub async fn confirm_payment(
    connections: &LedgerConnections,
    recorder: &dyn PaymentRecorder,
    claim: PaymentConfirmation,
) -> Result<RecordOutcome, EngineError> {
    let valid = validate(&claim)?;

    if recorder.is_recorded(&claim.transaction_signature).await? {
        return Ok(RecordOutcome::Duplicate);
    }

    let keys = connections
        .confirmed_account_keys(&valid.signature)
        .await?
        .ok_or_else(|| EngineError::UnconfirmedTransaction(claim.transaction_signature.clone()))?;
    if !keys.contains(&valid.sender) {
        return Err(EngineError::InvalidInput(
            "Sender does not match transaction".to_string(),
        ));
    }

    let payment = ConfirmedPayment {
        link_id: claim.link_id,
        amount: claim.amount,
        sender: claim.sender_address,
        signature: claim.transaction_signature,
        confirmed_at: chrono::Utc::now().timestamp_millis(),
    };
    let outcome = recorder.record(&payment).await?;
    info!(link = %payment.link_id, signature = %payment.signature, ?outcome, "payment confirmed");
    Ok(outcome)
}
