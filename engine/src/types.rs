//! Compressed-state data model

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Merkle tree flavour, numbered as the compression indexer reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TreeType {
    StateV1 = 1,
    AddressV1 = 2,
    StateV2 = 3,
    AddressV2 = 4,
}

impl TryFrom<u8> for TreeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TreeType::StateV1),
            2 => Ok(TreeType::AddressV1),
            3 => Ok(TreeType::StateV2),
            4 => Ok(TreeType::AddressV2),
            other => Err(format!("unknown tree type {other}")),
        }
    }
}

impl From<TreeType> for u8 {
    fn from(value: TreeType) -> Self {
        value as u8
    }
}

/// Location of a state tree and its companion accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeInfo {
    pub tree: Pubkey,
    /// Nullifier (V1) or output (V2) queue
    pub queue: Pubkey,
    pub cpi_context: Option<Pubkey>,
    pub tree_type: TreeType,
    /// Successor tree once this one is rolled over
    pub next_tree_info: Option<Box<TreeInfo>>,
}

impl TreeInfo {
    /// The tree new outputs should land in
    pub fn output_tree(&self) -> &TreeInfo {
        self.next_tree_info.as_deref().unwrap_or(self)
    }
}

/// Optional program data carried by a compressed account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedAccountData {
    pub discriminator: [u8; 8],
    pub data: Vec<u8>,
    pub data_hash: [u8; 32],
}

/// One unspent unit of compressed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedAccount {
    pub owner: Pubkey,
    pub lamports: u64,
    pub address: Option<[u8; 32]>,
    pub data: Option<CompressedAccountData>,
    /// Leaf hash in the state tree
    pub hash: [u8; 32],
    pub leaf_index: u32,
    pub prove_by_index: bool,
    pub tree_info: TreeInfo,
}

/// Compressed Groth16 proof (a, b, c)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedProof {
    pub a: [u8; 32],
    pub b: [u8; 64],
    pub c: [u8; 32],
}

/// Proof that a set of compressed accounts is valid against recent roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityProof {
    /// One root position per proven account, in request order
    pub root_indices: Vec<u16>,
    /// Absent when every account is proven by index
    pub compressed_proof: Option<CompressedProof>,
}

/// Everything an unshield needs from the compressed-state side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnshieldInputs {
    pub selected_accounts: Vec<CompressedAccount>,
    pub total_lamports: u64,
    pub proof: ValidityProof,
}
