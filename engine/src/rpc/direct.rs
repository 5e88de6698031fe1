//! Shielded reads straight against the compression indexer

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use super::{CompressionRpc, ShieldedSource};
use crate::balance::sum_lamports;
use crate::deadline::{with_deadline, Deadlines};
use crate::error::EngineError;
use crate::selection::select_minimal;
use crate::types::UnshieldInputs;

#[derive(Clone)]
pub struct DirectSource {
    rpc: Arc<dyn CompressionRpc>,
    deadlines: Deadlines,
}

impl DirectSource {
    pub fn new(rpc: Arc<dyn CompressionRpc>, deadlines: Deadlines) -> Self {
        Self { rpc, deadlines }
    }
}

#[async_trait]
impl ShieldedSource for DirectSource {
    async fn shielded_lamports(&self, owner: &Pubkey) -> Result<u64, EngineError> {
        let accounts = with_deadline(
            "compressed account lookup",
            self.deadlines.rpc(),
            self.rpc.compressed_accounts_by_owner(owner),
        )
        .await?;
        debug!(owner = %owner, accounts = accounts.len(), "fetched compressed accounts");
        sum_lamports(&accounts)
    }

    async fn unshield_inputs(
        &self,
        stealth: &Pubkey,
        recipient: &Pubkey,
        fee_payer: &Pubkey,
    ) -> Result<UnshieldInputs, EngineError> {
        let accounts = with_deadline(
            "compressed account lookup",
            self.deadlines.rpc(),
            self.rpc.compressed_accounts_by_owner(stealth),
        )
        .await?;

        let total = sum_lamports(&accounts)?;
        if accounts.is_empty() || total == 0 {
            return Err(EngineError::NoShieldedFunds);
        }

        // Full balance: every non-empty account ends up selected
        let selection = select_minimal(&accounts, total)?;
        let hashes: Vec<[u8; 32]> = selection.accounts.iter().map(|a| a.hash).collect();

        let proof = with_deadline(
            "validity proof",
            self.deadlines.proof(),
            self.rpc.validity_proof(&hashes),
        )
        .await?;
        if proof.root_indices.len() != hashes.len() {
            return Err(EngineError::ValidityProof(format!(
                "prover returned {} root indices for {} accounts",
                proof.root_indices.len(),
                hashes.len()
            )));
        }

        info!(
            stealth = %stealth,
            recipient = %recipient,
            fee_payer = %fee_payer,
            accounts = selection.accounts.len(),
            lamports = selection.total,
            "prepared unshield inputs"
        );

        Ok(UnshieldInputs {
            selected_accounts: selection.accounts,
            total_lamports: selection.total,
            proof,
        })
    }
}
