//! ZK-compression JSON-RPC client
//!
//! The compression indexer, the prover and the standard RPC share one
//! endpoint. Indexer methods are plain JSON-RPC 2.0 over HTTP POST; results
//! come wrapped as `{ context, value }`.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{address_lookup_table::state::AddressLookupTable, pubkey::Pubkey};
use tokio::sync::OnceCell;
use tracing::debug;

use super::CompressionRpc;
use crate::config::StateTreeSource;
use crate::error::EngineError;
use crate::tree::StateTrees;
use crate::types::{
    CompressedAccount, CompressedAccountData, CompressedProof, TreeInfo, TreeType, ValidityProof,
};

/// Page size requested from the indexer
const PAGE_LIMIT: u64 = 1000;

// ============================================================================
// Envelope
// ============================================================================

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

// ============================================================================
// Indexer payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountPage {
    items: Vec<AccountItem>,
    cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountItem {
    pub address: Option<String>,
    pub data: Option<AccountDataItem>,
    pub hash: String,
    pub lamports: u64,
    pub leaf_index: u32,
    pub owner: String,
    pub tree: Option<String>,
    pub merkle_context: Option<MerkleContextItem>,
    #[serde(default)]
    pub prove_by_index: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountDataItem {
    pub data: String,
    pub data_hash: String,
    pub discriminator: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MerkleContextItem {
    pub tree: String,
    pub queue: String,
    pub cpi_context: Option<String>,
    pub tree_type: u8,
    pub next_tree_context: Option<Box<MerkleContextItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofItem {
    compressed_proof: Option<ProofBytes>,
    root_indices: Vec<RootIndexItem>,
}

#[derive(Debug, Deserialize)]
struct ProofBytes {
    a: Vec<u8>,
    b: Vec<u8>,
    c: Vec<u8>,
}

/// Older indexers report bare numbers, newer ones an object per root
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RootIndexItem {
    Plain(u16),
    Detailed {
        #[serde(rename = "rootIndex")]
        root_index: u16,
    },
}

impl RootIndexItem {
    fn value(&self) -> u16 {
        match self {
            RootIndexItem::Plain(index) => *index,
            RootIndexItem::Detailed { root_index } => *root_index,
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

fn malformed(what: &str) -> EngineError {
    EngineError::Connection(format!("malformed indexer response: {what}"))
}

fn decode_pubkey(value: &str) -> Result<Pubkey, EngineError> {
    Pubkey::from_str(value).map_err(|_| malformed("bad public key"))
}

pub(crate) fn decode_hash(value: &str) -> Result<[u8; 32], EngineError> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|_| malformed("bad base58 hash"))?;
    bytes.try_into().map_err(|_| malformed("hash is not 32 bytes"))
}

fn tree_info_from_context(context: &MerkleContextItem) -> Result<TreeInfo, EngineError> {
    Ok(TreeInfo {
        tree: decode_pubkey(&context.tree)?,
        queue: decode_pubkey(&context.queue)?,
        cpi_context: context.cpi_context.as_deref().map(decode_pubkey).transpose()?,
        tree_type: TreeType::try_from(context.tree_type).map_err(|e| malformed(&e))?,
        next_tree_info: context
            .next_tree_context
            .as_deref()
            .map(tree_info_from_context)
            .transpose()?
            .map(Box::new),
    })
}

/// Turn one indexer item into a [`CompressedAccount`], resolving its tree
pub(crate) fn decode_account(
    item: &AccountItem,
    trees: &StateTrees,
) -> Result<CompressedAccount, EngineError> {
    let tree_info = match (&item.merkle_context, &item.tree) {
        (Some(context), _) => tree_info_from_context(context)?,
        (None, Some(tree)) => {
            let tree = decode_pubkey(tree)?;
            trees
                .find(&tree)
                .cloned()
                .ok_or_else(|| EngineError::Connection(format!("unknown state tree {tree}")))?
        }
        (None, None) => return Err(malformed("account without tree")),
    };

    let data = match &item.data {
        Some(data) => Some(CompressedAccountData {
            discriminator: data.discriminator.to_le_bytes(),
            data: BASE64
                .decode(&data.data)
                .map_err(|_| malformed("bad base64 account data"))?,
            data_hash: decode_hash(&data.data_hash)?,
        }),
        None => None,
    };

    Ok(CompressedAccount {
        owner: decode_pubkey(&item.owner)?,
        lamports: item.lamports,
        address: item.address.as_deref().map(decode_hash).transpose()?,
        data,
        hash: decode_hash(&item.hash)?,
        leaf_index: item.leaf_index,
        prove_by_index: item.prove_by_index,
        tree_info,
    })
}

fn decode_proof(item: ProofItem) -> Result<ValidityProof, EngineError> {
    let compressed_proof = match item.compressed_proof {
        Some(bytes) => Some(CompressedProof {
            a: bytes.a.try_into().map_err(|_| malformed("proof.a is not 32 bytes"))?,
            b: bytes.b.try_into().map_err(|_| malformed("proof.b is not 64 bytes"))?,
            c: bytes.c.try_into().map_err(|_| malformed("proof.c is not 32 bytes"))?,
        }),
        None => None,
    };
    Ok(ValidityProof {
        root_indices: item.root_indices.iter().map(RootIndexItem::value).collect(),
        compressed_proof,
    })
}

// ============================================================================
// Client
// ============================================================================

pub struct PhotonClient {
    http: reqwest::Client,
    url: String,
    ledger: Arc<RpcClient>,
    tree_source: StateTreeSource,
    trees: OnceCell<StateTrees>,
    next_id: AtomicU64,
}

impl PhotonClient {
    pub fn new(url: &str, ledger: Arc<RpcClient>, tree_source: StateTreeSource) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
            ledger,
            tree_source,
            trees: OnceCell::new(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, EngineError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, "indexer request");

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Connection(format!("{method} returned HTTP {status}")));
        }

        let body: RpcResponse<T> = response.json().await?;
        match (body.result, body.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(EngineError::Connection(format!(
                "{method} failed ({}): {}",
                error.code, error.message
            ))),
            (None, None) => Err(malformed("neither result nor error")),
        }
    }

    async fn load_trees(&self) -> Result<StateTrees, EngineError> {
        match self.tree_source {
            StateTreeSource::Localnet => Ok(StateTrees::localnet()),
            StateTreeSource::LookupTables { active, nullified } => {
                let table = self.lookup_table_addresses(&active).await?;
                let nullified = match nullified {
                    Some(address) => self.lookup_table_addresses(&address).await?,
                    None => Vec::new(),
                };
                let trees = StateTrees::from_lookup_tables(&table, &nullified)?;
                debug!(
                    active = trees.active().len(),
                    retired = trees.retired().len(),
                    "loaded state trees"
                );
                Ok(trees)
            }
        }
    }

    async fn lookup_table_addresses(&self, table: &Pubkey) -> Result<Vec<Pubkey>, EngineError> {
        let account = self.ledger.get_account(table).await?;
        let parsed = AddressLookupTable::deserialize(&account.data).map_err(|e| {
            EngineError::Connection(format!("lookup table {table} is unreadable: {e}"))
        })?;
        Ok(parsed.addresses.to_vec())
    }
}

#[async_trait]
impl CompressionRpc for PhotonClient {
    async fn compressed_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<CompressedAccount>, EngineError> {
        let trees = self.state_trees().await?;

        let mut accounts = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = json!({ "owner": owner.to_string(), "limit": PAGE_LIMIT });
            if let Some(cursor) = &cursor {
                params["cursor"] = json!(cursor);
            }

            let page: WithContext<AccountPage> = self
                .call("getCompressedAccountsByOwner", Some(params))
                .await?;
            let page = page.value;
            for item in &page.items {
                accounts.push(decode_account(item, &trees)?);
            }

            match page.cursor {
                Some(next) if !page.items.is_empty() && cursor.as_ref() != Some(&next) => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }
        Ok(accounts)
    }

    async fn validity_proof(&self, hashes: &[[u8; 32]]) -> Result<ValidityProof, EngineError> {
        let encoded: Vec<String> = hashes
            .iter()
            .map(|hash| bs58::encode(hash).into_string())
            .collect();
        let params = json!({ "hashes": encoded, "newAddressesWithTrees": [] });

        let result: WithContext<ProofItem> = self
            .call("getValidityProof", Some(params))
            .await
            .map_err(|e| match e {
                EngineError::Connection(message) | EngineError::InvalidInput(message) => {
                    EngineError::ValidityProof(message)
                }
                other => other,
            })?;
        decode_proof(result.value).map_err(|e| EngineError::ValidityProof(e.to_string()))
    }

    async fn state_trees(&self) -> Result<StateTrees, EngineError> {
        self.trees
            .get_or_try_init(|| self.load_trees())
            .await
            .cloned()
    }

    async fn indexer_health(&self) -> Result<String, EngineError> {
        self.call("getIndexerHealth", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_json(tree: &Pubkey) -> Value {
        json!({
            "address": null,
            "data": null,
            "hash": bs58::encode([7u8; 32]).into_string(),
            "lamports": 5_000_000,
            "leafIndex": 12,
            "owner": Pubkey::new_unique().to_string(),
            "seq": 3,
            "slotCreated": 100,
            "tree": tree.to_string(),
        })
    }

    #[test]
    fn test_decode_account_resolves_tree_from_table() {
        let trees = StateTrees::localnet();
        let tree = trees.active()[0].tree;
        let item: AccountItem = serde_json::from_value(item_json(&tree)).unwrap();

        let account = decode_account(&item, &trees).unwrap();
        assert_eq!(account.lamports, 5_000_000);
        assert_eq!(account.hash, [7u8; 32]);
        assert_eq!(account.leaf_index, 12);
        assert_eq!(account.tree_info, trees.active()[0]);
        assert!(!account.prove_by_index);
    }

    #[test]
    fn test_decode_account_unknown_tree() {
        let item: AccountItem = serde_json::from_value(item_json(&Pubkey::new_unique())).unwrap();
        let err = decode_account(&item, &StateTrees::localnet()).unwrap_err();
        assert!(matches!(err, EngineError::Connection(_)));
    }

    #[test]
    fn test_decode_account_with_merkle_context_and_data() {
        let tree = Pubkey::new_unique();
        let queue = Pubkey::new_unique();
        let mut value = item_json(&Pubkey::new_unique());
        value["merkleContext"] = json!({
            "tree": tree.to_string(),
            "queue": queue.to_string(),
            "cpiContext": null,
            "treeType": 1,
            "nextTreeContext": null,
        });
        value["data"] = json!({
            "data": BASE64.encode([1u8, 2, 3]),
            "dataHash": bs58::encode([9u8; 32]).into_string(),
            "discriminator": 2,
        });
        value["proveByIndex"] = json!(true);

        let item: AccountItem = serde_json::from_value(value).unwrap();
        let account = decode_account(&item, &StateTrees::default()).unwrap();
        assert_eq!(account.tree_info.tree, tree);
        assert_eq!(account.tree_info.queue, queue);
        assert!(account.prove_by_index);

        let data = account.data.unwrap();
        assert_eq!(data.discriminator, [2, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(data.data, vec![1, 2, 3]);
        assert_eq!(data.data_hash, [9u8; 32]);
    }

    #[test]
    fn test_short_hash_is_malformed() {
        assert!(decode_hash(&bs58::encode([1u8; 31]).into_string()).is_err());
        assert!(decode_hash("0OIl").is_err());
    }

    #[test]
    fn test_decode_proof_both_root_index_shapes() {
        let plain: ProofItem = serde_json::from_value(json!({
            "compressedProof": { "a": vec![1u8; 32], "b": vec![2u8; 64], "c": vec![3u8; 32] },
            "rootIndices": [4, 5],
            "roots": [],
        }))
        .unwrap();
        let proof = decode_proof(plain).unwrap();
        assert_eq!(proof.root_indices, vec![4, 5]);
        assert_eq!(proof.compressed_proof.unwrap().b, [2u8; 64]);

        let detailed: ProofItem = serde_json::from_value(json!({
            "compressedProof": null,
            "rootIndices": [{ "rootIndex": 9, "proveByIndex": false }],
        }))
        .unwrap();
        let proof = decode_proof(detailed).unwrap();
        assert_eq!(proof.root_indices, vec![9]);
        assert!(proof.compressed_proof.is_none());
    }

    #[test]
    fn test_wrong_proof_length_rejected() {
        let item: ProofItem = serde_json::from_value(json!({
            "compressedProof": { "a": vec![1u8; 31], "b": vec![2u8; 64], "c": vec![3u8; 32] },
            "rootIndices": [0],
        }))
        .unwrap();
        assert!(decode_proof(item).is_err());
    }

    #[test]
    fn test_request_envelope_omits_absent_params() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getIndexerHealth",
            params: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert!(encoded.get("params").is_none());
        assert_eq!(encoded["method"], "getIndexerHealth");
    }
}
