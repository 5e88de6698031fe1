//! Unshield: move a stealth key's entire shielded balance to a wallet
//!
//! The order is strict. Ownership is proven first, so a failing prover
//! aborts before the ledger is touched. Then accounts are fetched, selected
//! and proven, and finally a decompress transaction is compiled that needs
//! two signatures: the fee payer's and the stealth key's.

use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::connection::LedgerConnections;
use crate::deadline::with_deadline;
use crate::error::EngineError;
use crate::instruction::{self, DecompressParams};
use crate::ownership::{OwnershipProof, OwnershipProver, SignatureOwnershipProver};
use crate::rpc::ShieldedSource;
use crate::stealth::StealthKeypair;
use crate::transaction::UnsignedTransaction;
use crate::types::CompressedAccount;

/// A compiled withdrawal awaiting signatures
pub struct Withdrawal {
    /// Needs the fee payer's signature and `stealth_signer`'s
    pub transaction: UnsignedTransaction,
    pub stealth_signer: Keypair,
    pub ownership_proof: OwnershipProof,
    pub total_lamports: u64,
    pub spent_accounts: Vec<CompressedAccount>,
}

impl Withdrawal {
    /// Add the stealth signature; the fee payer still has to sign
    pub fn sign_stealth(&mut self) -> Result<(), EngineError> {
        self.transaction.sign(&self.stealth_signer)
    }
}

impl std::fmt::Debug for Withdrawal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Withdrawal")
            .field("transaction", &self.transaction)
            .field("stealth_signer", &"[REDACTED]")
            .field("ownership_proof", &self.ownership_proof)
            .field("total_lamports", &self.total_lamports)
            .field("spent_accounts", &self.spent_accounts.len())
            .finish()
    }
}

pub struct UnshieldBuilder<'a> {
    connections: &'a LedgerConnections,
    source: Arc<dyn ShieldedSource>,
    prover: Arc<dyn OwnershipProver>,
}

impl<'a> UnshieldBuilder<'a> {
    pub fn new(connections: &'a LedgerConnections, source: Arc<dyn ShieldedSource>) -> Self {
        Self {
            connections,
            source,
            prover: Arc::new(SignatureOwnershipProver),
        }
    }

    pub fn with_prover(mut self, prover: Arc<dyn OwnershipProver>) -> Self {
        self.prover = prover;
        self
    }

    async fn prove_ownership(
        &self,
        stealth: &StealthKeypair,
        bound_message: String,
    ) -> Result<OwnershipProof, EngineError> {
        let prover = Arc::clone(&self.prover);
        let secret = Zeroizing::new(*stealth.secret_key());
        let public_key = stealth.public_key();

        // Provers may be CPU-bound; keep them off the executor
        let task = tokio::task::spawn_blocking(move || {
            prover.prove(&secret, &public_key, &bound_message)
        });
        let joined = with_deadline(
            "ownership proof",
            self.connections.deadlines().ownership(),
            async {
                task.await
                    .map_err(|e| EngineError::OwnershipProof(format!("prover task failed: {e}")))?
            },
        )
        .await;

        joined.map_err(|e| match e {
            EngineError::OwnershipProof(_) | EngineError::Timeout { .. } => e,
            other => EngineError::OwnershipProof(other.to_string()),
        })
    }

    /// Build the withdrawal of the whole shielded balance of `stealth`
    pub async fn build_withdrawal(
        &self,
        stealth: &StealthKeypair,
        destination: &Pubkey,
        fee_payer: &Pubkey,
    ) -> Result<Withdrawal, EngineError> {
        let stealth_key = stealth.public_key();
        if *fee_payer == stealth_key {
            return Err(EngineError::InvalidInput(
                "fee payer must be distinct from the stealth key".to_string(),
            ));
        }

        let bound_message = format!(
            "unshield:{destination}:{}",
            chrono::Utc::now().timestamp_millis()
        );
        let ownership_proof = self.prove_ownership(stealth, bound_message).await.map_err(|e| {
            warn!(stealth = %stealth_key, error = %e, "ownership proof failed");
            e
        })?;
        debug!(stealth = %stealth_key, "ownership proven");

        let inputs = self
            .source
            .unshield_inputs(&stealth_key, destination, fee_payer)
            .await?;

        let ix = instruction::decompress(DecompressParams {
            fee_payer: *fee_payer,
            authority: stealth_key,
            inputs: &inputs.selected_accounts,
            proof: &inputs.proof,
            recipient: *destination,
            lamports: inputs.total_lamports,
        })?;

        let ledger = self.connections.standard_client()?;
        let blockhash = with_deadline(
            "blockhash fetch",
            self.connections.deadlines().rpc(),
            ledger.latest_blockhash(),
        )
        .await?;
        let transaction = UnsignedTransaction::compile(fee_payer, &[ix], blockhash)?;

        info!(
            stealth = %stealth_key,
            destination = %destination,
            accounts = inputs.selected_accounts.len(),
            lamports = inputs.total_lamports,
            "built unshield transaction"
        );

        Ok(Withdrawal {
            transaction,
            stealth_signer: stealth.to_signer()?,
            ownership_proof,
            total_lamports: inputs.total_lamports,
            spent_accounts: inputs.selected_accounts,
        })
    }
}
