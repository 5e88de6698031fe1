//! JSON contracts of the proxy endpoints
//!
//! Byte buffers travel as JSON number arrays and keys as base58 strings.
//! Lamport totals are decimal strings so no client has to squeeze them
//! through a float. Everything is re-validated on ingress: lengths are
//! checked before bytes go back into fixed-size arrays.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::EngineError;
use crate::types::{
    CompressedAccount, CompressedAccountData, CompressedProof, TreeInfo, TreeType, UnshieldInputs,
    ValidityProof,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRequest {
    pub public_key: Option<String>,
}

impl BalanceRequest {
    pub fn owner(&self) -> Result<Pubkey, EngineError> {
        required_key(&self.public_key, "publicKey")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// SOL
    pub balance: f64,
}

/// Failure body. `code` is set whenever the engine produced the failure so
/// the client can rebuild the same kind; plain rejections carry only `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_ms: Option<u64>,
}

impl ErrorResponse {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        let mut body = Self {
            error: err.to_string(),
            code: Some(err.code().to_string()),
            ..Self::default()
        };
        match err {
            EngineError::InsufficientBalance {
                required,
                available,
            } => {
                body.required = Some(*required);
                body.available = Some(*available);
            }
            EngineError::Timeout { after, .. } => {
                body.after_ms = Some(after.as_millis() as u64);
            }
            _ => {}
        }
        body
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnshieldDataRequest {
    pub stealth_public_key: Option<String>,
    pub recipient_public_key: Option<String>,
    pub fee_payer: Option<String>,
}

/// Validated keys of an [`UnshieldDataRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnshieldDataKeys {
    pub stealth: Pubkey,
    pub recipient: Pubkey,
    pub fee_payer: Pubkey,
}

impl UnshieldDataRequest {
    pub fn keys(&self) -> Result<UnshieldDataKeys, EngineError> {
        if self.stealth_public_key.is_none()
            || self.recipient_public_key.is_none()
            || self.fee_payer.is_none()
        {
            return Err(EngineError::InvalidInput("Missing required fields".to_string()));
        }
        Ok(UnshieldDataKeys {
            stealth: required_key(&self.stealth_public_key, "stealthPublicKey")?,
            recipient: required_key(&self.recipient_public_key, "recipientPublicKey")?,
            fee_payer: required_key(&self.fee_payer, "feePayer")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccountData {
    pub discriminator: Vec<u8>,
    pub data: Vec<u8>,
    pub data_hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTreeInfo {
    pub tree: String,
    pub queue: String,
    pub cpi_context: Option<String>,
    pub tree_type: u8,
    pub next_tree_info: Option<Box<WireTreeInfo>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccount {
    pub owner: String,
    /// Decimal string
    pub lamports: String,
    pub address: Option<String>,
    pub data: Option<WireAccountData>,
    pub hash: Vec<u8>,
    pub leaf_index: u32,
    #[serde(default)]
    pub prove_by_index: bool,
    pub tree_info: Option<WireTreeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProof {
    pub a: Vec<u8>,
    pub b: Vec<u8>,
    pub c: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnshieldDataResponse {
    pub selected_accounts: Vec<WireAccount>,
    /// Decimal string
    pub total_lamports: String,
    pub root_indices: Vec<u16>,
    pub compressed_proof: Option<WireProof>,
}

// ============================================================================
// Engine -> wire
// ============================================================================

impl From<&TreeInfo> for WireTreeInfo {
    fn from(info: &TreeInfo) -> Self {
        Self {
            tree: info.tree.to_string(),
            queue: info.queue.to_string(),
            cpi_context: info.cpi_context.map(|key| key.to_string()),
            tree_type: info.tree_type.into(),
            next_tree_info: info
                .next_tree_info
                .as_deref()
                .map(|next| Box::new(WireTreeInfo::from(next))),
        }
    }
}

impl From<&CompressedAccount> for WireAccount {
    fn from(account: &CompressedAccount) -> Self {
        Self {
            owner: account.owner.to_string(),
            lamports: account.lamports.to_string(),
            address: account.address.map(|a| Pubkey::new_from_array(a).to_string()),
            data: account.data.as_ref().map(|data| WireAccountData {
                discriminator: data.discriminator.to_vec(),
                data: data.data.clone(),
                data_hash: data.data_hash.to_vec(),
            }),
            hash: account.hash.to_vec(),
            leaf_index: account.leaf_index,
            prove_by_index: account.prove_by_index,
            tree_info: Some(WireTreeInfo::from(&account.tree_info)),
        }
    }
}

impl From<&UnshieldInputs> for UnshieldDataResponse {
    fn from(inputs: &UnshieldInputs) -> Self {
        Self {
            selected_accounts: inputs.selected_accounts.iter().map(WireAccount::from).collect(),
            total_lamports: inputs.total_lamports.to_string(),
            root_indices: inputs.proof.root_indices.clone(),
            compressed_proof: inputs.proof.compressed_proof.map(|proof| WireProof {
                a: proof.a.to_vec(),
                b: proof.b.to_vec(),
                c: proof.c.to_vec(),
            }),
        }
    }
}

// ============================================================================
// Wire -> engine
// ============================================================================

fn invalid(what: impl Into<String>) -> EngineError {
    EngineError::InvalidInput(what.into())
}

fn required_key(value: &Option<String>, field: &str) -> Result<Pubkey, EngineError> {
    let value = value
        .as_deref()
        .ok_or_else(|| invalid(format!("Missing {field}")))?;
    Pubkey::from_str(value).map_err(|_| EngineError::InvalidAddress(value.to_string()))
}

fn key(value: &str, field: &str) -> Result<Pubkey, EngineError> {
    Pubkey::from_str(value).map_err(|_| invalid(format!("{field} is not a valid key")))
}

fn fixed<const N: usize>(bytes: Vec<u8>, field: &str) -> Result<[u8; N], EngineError> {
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| invalid(format!("{field} must be {N} bytes, got {len}")))
}

fn lamports(value: &str, field: &str) -> Result<u64, EngineError> {
    value
        .parse::<u64>()
        .map_err(|_| invalid(format!("{field} is not a lamport amount")))
}

impl TryFrom<WireTreeInfo> for TreeInfo {
    type Error = EngineError;

    fn try_from(wire: WireTreeInfo) -> Result<Self, Self::Error> {
        Ok(TreeInfo {
            tree: key(&wire.tree, "treeInfo.tree")?,
            queue: key(&wire.queue, "treeInfo.queue")?,
            cpi_context: wire
                .cpi_context
                .as_deref()
                .map(|k| key(k, "treeInfo.cpiContext"))
                .transpose()?,
            tree_type: TreeType::try_from(wire.tree_type).map_err(invalid)?,
            next_tree_info: match wire.next_tree_info {
                Some(next) => Some(Box::new(TreeInfo::try_from(*next)?)),
                None => None,
            },
        })
    }
}

impl TryFrom<WireAccount> for CompressedAccount {
    type Error = EngineError;

    fn try_from(wire: WireAccount) -> Result<Self, Self::Error> {
        let tree_info = wire
            .tree_info
            .ok_or_else(|| invalid("account is missing treeInfo"))?;

        Ok(CompressedAccount {
            owner: key(&wire.owner, "owner")?,
            lamports: lamports(&wire.lamports, "lamports")?,
            address: wire
                .address
                .as_deref()
                .map(|a| key(a, "address").map(|k| k.to_bytes()))
                .transpose()?,
            data: match wire.data {
                Some(data) => Some(CompressedAccountData {
                    discriminator: fixed(data.discriminator, "data.discriminator")?,
                    data: data.data,
                    data_hash: fixed(data.data_hash, "data.dataHash")?,
                }),
                None => None,
            },
            hash: fixed(wire.hash, "hash")?,
            leaf_index: wire.leaf_index,
            prove_by_index: wire.prove_by_index,
            tree_info: TreeInfo::try_from(tree_info)?,
        })
    }
}

impl TryFrom<UnshieldDataResponse> for UnshieldInputs {
    type Error = EngineError;

    fn try_from(wire: UnshieldDataResponse) -> Result<Self, Self::Error> {
        let total_lamports = lamports(&wire.total_lamports, "totalLamports")?;
        let selected_accounts = wire
            .selected_accounts
            .into_iter()
            .map(CompressedAccount::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if selected_accounts.is_empty() {
            return Err(invalid("no accounts selected"));
        }
        if wire.root_indices.len() != selected_accounts.len() {
            return Err(invalid("rootIndices does not match selectedAccounts"));
        }
        let sum: u128 = selected_accounts.iter().map(|a| u128::from(a.lamports)).sum();
        if sum != u128::from(total_lamports) {
            return Err(invalid("totalLamports does not match selectedAccounts"));
        }

        let compressed_proof = match wire.compressed_proof {
            Some(proof) => Some(CompressedProof {
                a: fixed(proof.a, "compressedProof.a")?,
                b: fixed(proof.b, "compressedProof.b")?,
                c: fixed(proof.c, "compressedProof.c")?,
            }),
            None => None,
        };

        Ok(UnshieldInputs {
            selected_accounts,
            total_lamports,
            proof: ValidityProof {
                root_indices: wire.root_indices,
                compressed_proof,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{account_with, proof_for};
    use serde_json::json;

    fn inputs() -> UnshieldInputs {
        let selected_accounts = vec![account_with(700), account_with(300)];
        UnshieldInputs {
            proof: proof_for(selected_accounts.len()),
            selected_accounts,
            total_lamports: 1_000,
        }
    }

    #[test]
    fn test_response_uses_camel_case_and_strings() {
        let wire = UnshieldDataResponse::from(&inputs());
        let value = serde_json::to_value(&wire).unwrap();

        assert_eq!(value["totalLamports"], json!("1000"));
        assert_eq!(value["selectedAccounts"][0]["lamports"], json!("700"));
        assert_eq!(value["selectedAccounts"][0]["hash"].as_array().unwrap().len(), 32);
        assert_eq!(value["compressedProof"]["b"].as_array().unwrap().len(), 64);
        assert!(value["selectedAccounts"][0]["treeInfo"]["treeType"].is_number());
    }

    #[test]
    fn test_both_paths_yield_identical_inputs() {
        let original = inputs();
        let json = serde_json::to_string(&UnshieldDataResponse::from(&original)).unwrap();
        let parsed: UnshieldDataResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(UnshieldInputs::try_from(parsed).unwrap(), original);
    }

    #[test]
    fn test_short_buffers_rejected() {
        let mut wire = UnshieldDataResponse::from(&inputs());
        wire.selected_accounts[0].hash.pop();
        let err = UnshieldInputs::try_from(wire).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let mut wire = UnshieldDataResponse::from(&inputs());
        if let Some(proof) = wire.compressed_proof.as_mut() {
            proof.a.push(0);
        }
        assert!(UnshieldInputs::try_from(wire).is_err());
    }

    #[test]
    fn test_inconsistent_totals_rejected() {
        let mut wire = UnshieldDataResponse::from(&inputs());
        wire.total_lamports = "999".to_string();
        assert!(UnshieldInputs::try_from(wire).is_err());

        let mut wire = UnshieldDataResponse::from(&inputs());
        wire.root_indices.pop();
        assert!(UnshieldInputs::try_from(wire).is_err());

        let mut wire = UnshieldDataResponse::from(&inputs());
        wire.selected_accounts[1].lamports = "-3".to_string();
        assert!(UnshieldInputs::try_from(wire).is_err());
    }

    #[test]
    fn test_request_validation() {
        let missing: UnshieldDataRequest =
            serde_json::from_value(json!({ "stealthPublicKey": Pubkey::new_unique().to_string() }))
                .unwrap();
        assert!(matches!(missing.keys(), Err(EngineError::InvalidInput(_))));

        let bad: UnshieldDataRequest = serde_json::from_value(json!({
            "stealthPublicKey": "not-a-key",
            "recipientPublicKey": Pubkey::new_unique().to_string(),
            "feePayer": Pubkey::new_unique().to_string(),
        }))
        .unwrap();
        assert!(matches!(bad.keys(), Err(EngineError::InvalidAddress(_))));

        let empty = BalanceRequest::default();
        assert!(matches!(empty.owner(), Err(EngineError::InvalidInput(_))));
    }
}
