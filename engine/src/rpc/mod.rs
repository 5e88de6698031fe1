//! Ledger and indexer access
//!
//! Two traits sit at the network seam:
//! - [`CompressionRpc`] for the ZK-compression indexer and prover
//! - [`LedgerRpc`] for standard Solana RPC
//!
//! Engine reads go through a [`ShieldedSource`], which either talks to the
//! indexer directly ([`DirectSource`]) or delegates to a proxy
//! ([`proxy::ProxySource`]). Both produce identical [`UnshieldInputs`].

pub mod direct;
pub mod ledger;
pub mod photon;
pub mod proxy;

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};

use crate::error::EngineError;
use crate::tree::StateTrees;
use crate::types::{CompressedAccount, UnshieldInputs, ValidityProof};

pub use direct::DirectSource;

#[async_trait]
pub trait CompressionRpc: Send + Sync {
    /// Every unspent compressed account owned by `owner`
    async fn compressed_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<CompressedAccount>, EngineError>;

    /// Validity proof for the given leaf hashes, in order
    async fn validity_proof(&self, hashes: &[[u8; 32]]) -> Result<ValidityProof, EngineError>;

    async fn state_trees(&self) -> Result<StateTrees, EngineError>;

    /// Raw health string reported by the indexer ("ok" when healthy)
    async fn indexer_health(&self) -> Result<String, EngineError>;
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, EngineError>;

    async fn slot(&self) -> Result<u64, EngineError>;

    async fn send_and_confirm(&self, transaction: &VersionedTransaction) -> Result<Signature, EngineError>;

    /// Account keys of a confirmed transaction; `None` if it is unknown or
    /// not yet confirmed
    async fn transaction_account_keys(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<Pubkey>>, EngineError>;
}

/// Where shielded balances and unshield inputs come from
#[async_trait]
pub trait ShieldedSource: Send + Sync {
    async fn shielded_lamports(&self, owner: &Pubkey) -> Result<u64, EngineError>;

    /// Select and prove the accounts an unshield of the full balance spends
    async fn unshield_inputs(
        &self,
        stealth: &Pubkey,
        recipient: &Pubkey,
        fee_payer: &Pubkey,
    ) -> Result<UnshieldInputs, EngineError>;
}
