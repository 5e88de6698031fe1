//! Shared ledger and indexer connections
//!
//! [`LedgerConnections`] is the one context object every builder borrows.
//! Clients are created lazily on first use and then shared; a missing RPC
//! endpoint surfaces as a configuration error at that point rather than at
//! construction.

use std::sync::{Arc, OnceLock};

use solana_sdk::{signature::Signature, pubkey::Pubkey};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::deadline::{with_deadline, Deadlines};
use crate::error::EngineError;
use crate::rpc::{
    ledger::SolanaLedger, photon::PhotonClient, proxy::ProxySource, CompressionRpc, DirectSource,
    LedgerRpc, ShieldedSource,
};
use crate::transaction::UnsignedTransaction;

/// How shielded reads reach the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPath {
    /// Query the indexer from this process
    Direct,
    /// Go through the proxy endpoints
    Proxy,
}

pub struct LedgerConnections {
    config: EngineConfig,
    ledger: OnceLock<Arc<SolanaLedger>>,
    compression: OnceLock<Arc<dyn CompressionRpc>>,
    standard: OnceLock<Arc<dyn LedgerRpc>>,
}

impl LedgerConnections {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ledger: OnceLock::new(),
            compression: OnceLock::new(),
            standard: OnceLock::new(),
        }
    }

    /// Use prebuilt clients (alternate backends, tests)
    pub fn from_clients(
        config: EngineConfig,
        compression: Arc<dyn CompressionRpc>,
        standard: Arc<dyn LedgerRpc>,
    ) -> Self {
        let connections = Self::new(config);
        let _ = connections.compression.set(compression);
        let _ = connections.standard.set(standard);
        connections
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn deadlines(&self) -> Deadlines {
        self.config.deadlines
    }

    fn solana_ledger(&self) -> Result<Arc<SolanaLedger>, EngineError> {
        if let Some(ledger) = self.ledger.get() {
            return Ok(Arc::clone(ledger));
        }
        let url = self.config.rpc_url()?;
        info!(rpc = %url, "connecting to ledger");
        Ok(Arc::clone(
            self.ledger.get_or_init(|| Arc::new(SolanaLedger::connect(url))),
        ))
    }

    /// Client for the compression indexer and prover
    pub fn compression_client(&self) -> Result<Arc<dyn CompressionRpc>, EngineError> {
        if let Some(client) = self.compression.get() {
            return Ok(Arc::clone(client));
        }
        let url = self.config.rpc_url()?;
        let tree_source = self.config.state_tree_source()?;
        let ledger = self.solana_ledger()?;
        Ok(Arc::clone(self.compression.get_or_init(|| {
            Arc::new(PhotonClient::new(url, ledger.client(), tree_source))
        })))
    }

    /// Client for standard ledger RPC
    pub fn standard_client(&self) -> Result<Arc<dyn LedgerRpc>, EngineError> {
        if let Some(client) = self.standard.get() {
            return Ok(Arc::clone(client));
        }
        let ledger: Arc<dyn LedgerRpc> = self.solana_ledger()?;
        Ok(Arc::clone(self.standard.get_or_init(|| ledger)))
    }

    /// Source for balances and unshield inputs along `path`
    pub fn shielded_source(&self, path: DataPath) -> Result<Arc<dyn ShieldedSource>, EngineError> {
        match path {
            DataPath::Direct => Ok(Arc::new(DirectSource::new(
                self.compression_client()?,
                self.deadlines(),
            ))),
            DataPath::Proxy => Ok(Arc::new(ProxySource::new(
                self.config.proxy_url()?,
                self.deadlines(),
            ))),
        }
    }

    /// Submit a fully signed transaction and wait for confirmation
    pub async fn submit(&self, transaction: UnsignedTransaction) -> Result<Signature, EngineError> {
        let signed = transaction.into_signed()?;
        let client = self.standard_client()?;
        with_deadline(
            "transaction submission",
            self.deadlines().rpc(),
            client.send_and_confirm(&signed),
        )
        .await
    }

    /// Confirmed account keys of `signature`, if any
    pub async fn confirmed_account_keys(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<Pubkey>>, EngineError> {
        let client = self.standard_client()?;
        with_deadline(
            "transaction lookup",
            self.deadlines().rpc(),
            client.transaction_account_keys(signature),
        )
        .await
    }

    /// True iff the ledger answers with a positive slot within the health
    /// deadline
    pub async fn check_rpc_health(&self) -> bool {
        let client = match self.standard_client() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "RPC health check skipped");
                return false;
            }
        };
        match with_deadline("RPC health", self.deadlines().health(), client.slot()).await {
            Ok(slot) => slot > 0,
            Err(e) => {
                warn!(error = %e, "RPC health check failed");
                false
            }
        }
    }

    /// True iff the indexer reports "ok" within the health deadline
    pub async fn check_indexer_health(&self) -> bool {
        let client = match self.compression_client() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "indexer health check skipped");
                return false;
            }
        };
        match with_deadline(
            "indexer health",
            self.deadlines().health(),
            client.indexer_health(),
        )
        .await
        {
            Ok(status) => status == "ok",
            Err(e) => {
                warn!(error = %e, "indexer health check failed");
                false
            }
        }
    }
}
