//! Standard Solana RPC

use std::sync::Arc;

use async_trait::async_trait;
use solana_client::{
    client_error::ClientErrorKind, nonblocking::rpc_client::RpcClient,
    rpc_config::RpcTransactionConfig,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::UiTransactionEncoding;
use tracing::{debug, info};

use super::LedgerRpc;
use crate::error::EngineError;

pub struct SolanaLedger {
    client: Arc<RpcClient>,
}

impl SolanaLedger {
    /// Client with `confirmed` commitment
    pub fn connect(url: &str) -> Self {
        Self::from_client(Arc::new(RpcClient::new_with_commitment(
            url.to_string(),
            CommitmentConfig::confirmed(),
        )))
    }

    pub fn from_client(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    /// Shared handle, e.g. for lookup table reads
    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    async fn latest_blockhash(&self) -> Result<Hash, EngineError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn slot(&self) -> Result<u64, EngineError> {
        Ok(self.client.get_slot().await?)
    }

    async fn send_and_confirm(&self, transaction: &VersionedTransaction) -> Result<Signature, EngineError> {
        let signature = self.client.send_and_confirm_transaction(transaction).await?;
        info!(signature = %signature, "transaction confirmed");
        Ok(signature)
    }

    async fn transaction_account_keys(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<Pubkey>>, EngineError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        let fetched = match self.client.get_transaction_with_config(signature, config).await {
            Ok(fetched) => fetched,
            Err(e) => match e.kind() {
                ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
                    return Err(EngineError::Connection(format!(
                        "transaction lookup failed: {e}"
                    )));
                }
                _ => {
                    // Unknown signatures come back as a null result or an RPC error
                    debug!(signature = %signature, error = %e, "transaction not found");
                    return Ok(None);
                }
            },
        };

        if fetched
            .transaction
            .meta
            .as_ref()
            .is_some_and(|meta| meta.err.is_some())
        {
            return Ok(None);
        }

        let decoded = fetched.transaction.transaction.decode().ok_or_else(|| {
            EngineError::Connection(format!("transaction {signature} could not be decoded"))
        })?;
        Ok(Some(decoded.message.static_account_keys().to_vec()))
    }
}
