//! Shared fixtures and unit-level scenario tests
//!
//! Fixtures:
//! - `account_with` / `owned_account` build compressed accounts on the
//!   local test tree
//! - `FakeCompression` / `FakeLedger` stand in for the indexer and ledger,
//!   counting every call so tests can assert nothing touched the network

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};

use crate::config::EngineConfig;
use crate::connection::LedgerConnections;
use crate::error::EngineError;
use crate::ownership::{OwnershipProof, OwnershipProver, SignatureOwnershipProver};
use crate::rpc::{CompressionRpc, LedgerRpc};
use crate::tree::StateTrees;
use crate::types::{CompressedAccount, CompressedProof, ValidityProof};

static NEXT_LEAF: AtomicU32 = AtomicU32::new(1);

/// Compressed account with a unique hash on the local test tree
pub(crate) fn account_with(lamports: u64) -> CompressedAccount {
    owned_account(Pubkey::default(), lamports)
}

pub(crate) fn owned_account(owner: Pubkey, lamports: u64) -> CompressedAccount {
    let leaf = NEXT_LEAF.fetch_add(1, Ordering::Relaxed);
    let mut hash = [0u8; 32];
    hash[..4].copy_from_slice(&leaf.to_be_bytes());
    hash[31] = 0xAB;

    CompressedAccount {
        owner,
        lamports,
        address: None,
        data: None,
        hash,
        leaf_index: leaf,
        prove_by_index: false,
        tree_info: StateTrees::localnet().active()[0].clone(),
    }
}

pub(crate) fn proof_for(accounts: usize) -> ValidityProof {
    ValidityProof {
        root_indices: (0..accounts).map(|i| i as u16).collect(),
        compressed_proof: Some(CompressedProof {
            a: [1u8; 32],
            b: [2u8; 64],
            c: [3u8; 32],
        }),
    }
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub(crate) struct FakeCompression {
    accounts: Mutex<HashMap<Pubkey, Vec<CompressedAccount>>>,
    failing_owners: Mutex<Vec<Pubkey>>,
    pub proof_requests: Mutex<Vec<Vec<[u8; 32]>>>,
    pub account_requests: AtomicUsize,
    pub proof_error: Mutex<Option<String>>,
    /// Account lookups never settle
    pub hang: AtomicBool,
}

impl FakeCompression {
    pub fn with_accounts(owner: Pubkey, lamports: &[u64]) -> Self {
        let fake = Self::default();
        fake.add_accounts(owner, lamports);
        fake
    }

    pub fn add_accounts(&self, owner: Pubkey, lamports: &[u64]) {
        let mut accounts = self.accounts.lock().unwrap();
        let entry = accounts.entry(owner).or_default();
        entry.extend(lamports.iter().map(|l| owned_account(owner, *l)));
    }

    pub fn fail_for(&self, owner: Pubkey) {
        self.failing_owners.lock().unwrap().push(owner);
    }

    pub fn network_calls(&self) -> usize {
        self.account_requests.load(Ordering::SeqCst) + self.proof_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompressionRpc for FakeCompression {
    async fn compressed_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<CompressedAccount>, EngineError> {
        self.account_requests.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing_owners.lock().unwrap().contains(owner) {
            return Err(EngineError::Connection("connection reset".to_string()));
        }
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn validity_proof(&self, hashes: &[[u8; 32]]) -> Result<ValidityProof, EngineError> {
        self.proof_requests.lock().unwrap().push(hashes.to_vec());
        if let Some(message) = self.proof_error.lock().unwrap().clone() {
            return Err(EngineError::ValidityProof(message));
        }
        Ok(proof_for(hashes.len()))
    }

    async fn state_trees(&self) -> Result<StateTrees, EngineError> {
        Ok(StateTrees::localnet())
    }

    async fn indexer_health(&self) -> Result<String, EngineError> {
        Ok("ok".to_string())
    }
}

pub(crate) struct FakeLedger {
    pub blockhash: Hash,
    pub calls: AtomicUsize,
    pub sent: Mutex<Vec<VersionedTransaction>>,
    pub confirmed: Mutex<HashMap<Signature, Vec<Pubkey>>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            confirmed: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn latest_blockhash(&self) -> Result<Hash, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blockhash)
    }

    async fn slot(&self) -> Result<u64, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(42)
    }

    async fn send_and_confirm(&self, transaction: &VersionedTransaction) -> Result<Signature, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // The ledger verifies every signature slot
        if transaction.verify_with_results().iter().any(|ok| !ok) {
            return Err(EngineError::TransactionBuild("signature verification failed".to_string()));
        }
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn transaction_account_keys(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<Pubkey>>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.confirmed.lock().unwrap().get(signature).cloned())
    }
}

pub(crate) struct FailingProver;

impl OwnershipProver for FailingProver {
    fn prove(&self, _: &[u8; 64], _: &Pubkey, _: &str) -> Result<OwnershipProof, EngineError> {
        Err(EngineError::OwnershipProof("circuit unavailable".to_string()))
    }

    fn verify(&self, _: &OwnershipProof) -> bool {
        false
    }
}

/// Prover that holds the blocking thread longer than any test deadline
pub(crate) struct SlowProver;

impl OwnershipProver for SlowProver {
    fn prove(
        &self,
        secret: &[u8; 64],
        public_key: &Pubkey,
        message: &str,
    ) -> Result<OwnershipProof, EngineError> {
        std::thread::sleep(std::time::Duration::from_millis(300));
        SignatureOwnershipProver.prove(secret, public_key, message)
    }

    fn verify(&self, proof: &OwnershipProof) -> bool {
        SignatureOwnershipProver.verify(proof)
    }
}

/// Connections over fakes; no RPC URL is configured, so anything that
/// bypasses the fakes fails loudly
pub(crate) fn fake_connections(
    compression: Arc<FakeCompression>,
    ledger: Arc<FakeLedger>,
) -> LedgerConnections {
    LedgerConnections::from_clients(EngineConfig::default(), compression, ledger)
}

// ============================================================================
// Scenarios
// ============================================================================

#[cfg(test)]
mod scenario_tests {
    use super::*;
    use crate::balance::BalanceAggregator;
    use crate::connection::DataPath;
    use crate::deposit::DepositBuilder;
    use crate::error::ErrorKind;
    use crate::selection::select_minimal;

    #[tokio::test]
    async fn test_balance_of_two_accounts() {
        let owner = Pubkey::new_unique();
        let compression = Arc::new(FakeCompression::with_accounts(
            owner,
            &[500_000_000, 300_000_000],
        ));
        let connections = fake_connections(compression, Arc::new(FakeLedger::default()));

        let aggregator = BalanceAggregator::new(connections.shielded_source(DataPath::Direct).unwrap());
        let balance = aggregator.balance(&owner).await.unwrap();
        assert_eq!(balance.lamports, 800_000_000);
        assert_eq!(balance.as_sol(), 0.8);
    }

    #[tokio::test]
    async fn test_owner_without_accounts_has_zero_balance() {
        let connections = fake_connections(
            Arc::new(FakeCompression::default()),
            Arc::new(FakeLedger::default()),
        );
        let aggregator = BalanceAggregator::new(connections.shielded_source(DataPath::Direct).unwrap());
        let balance = aggregator.balance(&Pubkey::new_unique()).await.unwrap();
        assert_eq!(balance.lamports, 0);
    }

    #[test]
    fn test_three_equal_accounts_all_needed() {
        let accounts: Vec<_> = [300_000_000, 300_000_000, 300_000_000]
            .into_iter()
            .map(account_with)
            .collect();
        let selection = select_minimal(&accounts, 800_000_000).unwrap();
        assert_eq!(selection.accounts.len(), 3);
        assert_eq!(selection.total, 900_000_000);
    }

    #[tokio::test]
    async fn test_invalid_recipient_produces_no_transaction() {
        let compression = Arc::new(FakeCompression::default());
        let ledger = Arc::new(FakeLedger::default());
        let connections = fake_connections(Arc::clone(&compression), Arc::clone(&ledger));

        let err = DepositBuilder::new(&connections)
            .build_deposit(&Pubkey::new_unique(), "not-a-valid-address", 1.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert!(err.to_string().contains("invalid"));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deposit_validation_precedes_network() {
        let compression = Arc::new(FakeCompression::default());
        let ledger = Arc::new(FakeLedger::default());
        let connections = fake_connections(Arc::clone(&compression), Arc::clone(&ledger));
        let builder = DepositBuilder::new(&connections);
        let recipient = Pubkey::new_unique().to_string();

        for amount in [0.0, 0.0001] {
            let err = builder
                .build_deposit(&Pubkey::new_unique(), &recipient, amount)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            assert!(!err.is_retryable());
        }
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(compression.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_connections_fail_at_first_use() {
        let connections = LedgerConnections::new(EngineConfig::default());
        let err = connections.standard_client().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(connections.compression_client().is_err());
        assert!(!connections.check_rpc_health().await);
        assert!(!connections.check_indexer_health().await);
    }

    #[tokio::test]
    async fn test_health_checks_over_fakes() {
        let connections = fake_connections(
            Arc::new(FakeCompression::default()),
            Arc::new(FakeLedger::default()),
        );
        assert!(connections.check_rpc_health().await);
        assert!(connections.check_indexer_health().await);
    }
}
