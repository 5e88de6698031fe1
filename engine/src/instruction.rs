//! Light System Program `invoke` instructions
//!
//! Compress moves lamports from a payer into a new compressed account;
//! decompress spends compressed accounts and pays lamports out of the sol
//! pool to a regular account. Both use the same instruction:
//!
//! ```text
//! discriminator (8) || u32 LE length || borsh(InstructionDataInvoke)
//! ```

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
    system_program,
};

use crate::error::EngineError;
use crate::types::{CompressedAccount, CompressedProof, TreeInfo, ValidityProof};

pub const LIGHT_SYSTEM_PROGRAM_ID: Pubkey = pubkey!("SySTEM1eSU2p4BGQfQpimFEWWSC1XDFeun3Nqzz3rT7");
pub const ACCOUNT_COMPRESSION_PROGRAM_ID: Pubkey =
    pubkey!("compr6CUsB5m2jS4Y3831ztGSTnDpnKJTKS95d64XVq");
pub const NOOP_PROGRAM_ID: Pubkey = pubkey!("noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV");
pub const REGISTERED_PROGRAM_PDA: Pubkey = pubkey!("35hkDgaAKwMCaxRz2ocSZ6NaUrtKkyNqU6c4RV3tYJRh");
pub const ACCOUNT_COMPRESSION_AUTHORITY: Pubkey =
    pubkey!("HwXnGK3tPkkVY6P439H2p68AxpeuWXd5PcrAxFpbmfbA");

/// Anchor discriminator of `invoke`
pub const INVOKE_DISCRIMINATOR: [u8; 8] = [26, 16, 169, 7, 21, 202, 242, 25];

const SOL_POOL_PDA_SEED: &[u8] = b"sol_pool_pda";

/// Holds the lamports backing every compressed account
pub fn sol_pool_pda() -> Pubkey {
    Pubkey::find_program_address(&[SOL_POOL_PDA_SEED], &LIGHT_SYSTEM_PROGRAM_ID).0
}

// ============================================================================
// Instruction data
// ============================================================================

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompressedProofData {
    pub a: [u8; 32],
    pub b: [u8; 64],
    pub c: [u8; 32],
}

impl From<&CompressedProof> for CompressedProofData {
    fn from(proof: &CompressedProof) -> Self {
        Self {
            a: proof.a,
            b: proof.b,
            c: proof.c,
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompressedAccountDataLayout {
    pub discriminator: [u8; 8],
    pub data: Vec<u8>,
    pub data_hash: [u8; 32],
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompressedAccountLayout {
    pub owner: [u8; 32],
    pub lamports: u64,
    pub address: Option<[u8; 32]>,
    pub data: Option<CompressedAccountDataLayout>,
}

impl From<&CompressedAccount> for CompressedAccountLayout {
    fn from(account: &CompressedAccount) -> Self {
        Self {
            owner: account.owner.to_bytes(),
            lamports: account.lamports,
            address: account.address,
            data: account.data.as_ref().map(|data| CompressedAccountDataLayout {
                discriminator: data.discriminator,
                data: data.data.clone(),
                data_hash: data.data_hash,
            }),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PackedMerkleContext {
    pub merkle_tree_pubkey_index: u8,
    pub queue_pubkey_index: u8,
    pub leaf_index: u32,
    pub prove_by_index: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PackedCompressedAccountWithMerkleContext {
    pub compressed_account: CompressedAccountLayout,
    pub merkle_context: PackedMerkleContext,
    pub root_index: u16,
    pub read_only: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutputCompressedAccountWithPackedContext {
    pub compressed_account: CompressedAccountLayout,
    pub merkle_tree_index: u8,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewAddressParamsPacked {
    pub seed: [u8; 32],
    pub address_queue_account_index: u8,
    pub address_merkle_tree_account_index: u8,
    pub address_merkle_tree_root_index: u16,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct InstructionDataInvoke {
    pub proof: Option<CompressedProofData>,
    pub input_compressed_accounts_with_merkle_context: Vec<PackedCompressedAccountWithMerkleContext>,
    pub output_compressed_accounts: Vec<OutputCompressedAccountWithPackedContext>,
    pub relay_fee: Option<u64>,
    pub new_address_params: Vec<NewAddressParamsPacked>,
    pub compress_or_decompress_lamports: Option<u64>,
    pub is_compress: bool,
}

impl InstructionDataInvoke {
    /// Full instruction data, discriminator and length prefix included
    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        let inner = self
            .try_to_vec()
            .map_err(|e| EngineError::TransactionBuild(format!("failed to encode invoke: {e}")))?;
        let len = u32::try_from(inner.len())
            .map_err(|_| EngineError::TransactionBuild("invoke data too large".to_string()))?;

        let mut data = Vec::with_capacity(8 + 4 + inner.len());
        data.extend_from_slice(&INVOKE_DISCRIMINATOR);
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&inner);
        Ok(data)
    }

    /// Inverse of [`encode`](Self::encode)
    pub fn decode(data: &[u8]) -> Result<Self, EngineError> {
        let malformed = || EngineError::InvalidInput("malformed invoke data".to_string());

        let rest = data.strip_prefix(&INVOKE_DISCRIMINATOR[..]).ok_or_else(malformed)?;
        if rest.len() < 4 {
            return Err(malformed());
        }
        let (len, body) = rest.split_at(4);
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        if body.len() != len {
            return Err(malformed());
        }
        Self::try_from_slice(body).map_err(|_| malformed())
    }
}

// ============================================================================
// Remaining accounts
// ============================================================================

/// Deduplicated tree and queue accounts, addressed by index
#[derive(Debug, Default)]
struct PackedAccounts {
    keys: Vec<Pubkey>,
}

impl PackedAccounts {
    fn insert_or_get(&mut self, key: Pubkey) -> Result<u8, EngineError> {
        let index = match self.keys.iter().position(|k| *k == key) {
            Some(index) => index,
            None => {
                self.keys.push(key);
                self.keys.len() - 1
            }
        };
        u8::try_from(index)
            .map_err(|_| EngineError::TransactionBuild("too many tree accounts".to_string()))
    }

    fn into_metas(self) -> Vec<AccountMeta> {
        self.keys
            .into_iter()
            .map(|key| AccountMeta::new(key, false))
            .collect()
    }
}

fn invoke_accounts(
    fee_payer: Pubkey,
    authority: Pubkey,
    decompression_recipient: Option<Pubkey>,
    remaining: PackedAccounts,
) -> Vec<AccountMeta> {
    let mut metas = vec![
        AccountMeta::new(fee_payer, true),
        AccountMeta::new_readonly(authority, true),
        AccountMeta::new_readonly(REGISTERED_PROGRAM_PDA, false),
        AccountMeta::new_readonly(NOOP_PROGRAM_ID, false),
        AccountMeta::new_readonly(ACCOUNT_COMPRESSION_AUTHORITY, false),
        AccountMeta::new_readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
        AccountMeta::new(sol_pool_pda(), false),
    ];
    // An absent optional account is passed as the program id
    metas.push(match decompression_recipient {
        Some(recipient) => AccountMeta::new(recipient, false),
        None => AccountMeta::new_readonly(LIGHT_SYSTEM_PROGRAM_ID, false),
    });
    metas.push(AccountMeta::new_readonly(system_program::id(), false));
    metas.extend(remaining.into_metas());
    metas
}

fn output_account(owner: &Pubkey, lamports: u64, merkle_tree_index: u8) -> OutputCompressedAccountWithPackedContext {
    OutputCompressedAccountWithPackedContext {
        compressed_account: CompressedAccountLayout {
            owner: owner.to_bytes(),
            lamports,
            address: None,
            data: None,
        },
        merkle_tree_index,
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Compress `lamports` from `payer` into a new account owned by `recipient`
pub fn compress(
    payer: &Pubkey,
    recipient: &Pubkey,
    lamports: u64,
    tree: &TreeInfo,
) -> Result<Instruction, EngineError> {
    let mut remaining = PackedAccounts::default();
    let tree_index = remaining.insert_or_get(tree.output_tree().tree)?;

    let data = InstructionDataInvoke {
        proof: None,
        input_compressed_accounts_with_merkle_context: Vec::new(),
        output_compressed_accounts: vec![output_account(recipient, lamports, tree_index)],
        relay_fee: None,
        new_address_params: Vec::new(),
        compress_or_decompress_lamports: Some(lamports),
        is_compress: true,
    }
    .encode()?;

    Ok(Instruction {
        program_id: LIGHT_SYSTEM_PROGRAM_ID,
        accounts: invoke_accounts(*payer, *payer, None, remaining),
        data,
    })
}

/// Inputs for [`decompress`]
#[derive(Debug)]
pub struct DecompressParams<'a> {
    /// Pays fees and signs first
    pub fee_payer: Pubkey,
    /// Owner of the spent accounts; signs second
    pub authority: Pubkey,
    pub inputs: &'a [CompressedAccount],
    pub proof: &'a ValidityProof,
    pub recipient: Pubkey,
    pub lamports: u64,
}

/// Spend `inputs` and pay `lamports` to `recipient`; any remainder goes
/// back to `authority` as a new compressed account
pub fn decompress(params: DecompressParams<'_>) -> Result<Instruction, EngineError> {
    if params.fee_payer == params.authority {
        return Err(EngineError::InvalidInput(
            "fee payer must be distinct from the stealth authority".to_string(),
        ));
    }
    let first = params
        .inputs
        .first()
        .ok_or_else(|| EngineError::TransactionBuild("decompress needs at least one input".to_string()))?;
    if params.proof.root_indices.len() != params.inputs.len() {
        return Err(EngineError::TransactionBuild(format!(
            "{} root indices for {} inputs",
            params.proof.root_indices.len(),
            params.inputs.len()
        )));
    }

    let total = params
        .inputs
        .iter()
        .try_fold(0u64, |acc, account| acc.checked_add(account.lamports))
        .ok_or_else(|| EngineError::TransactionBuild("input lamports overflow".to_string()))?;
    if total < params.lamports {
        return Err(EngineError::InsufficientBalance {
            required: params.lamports,
            available: total,
        });
    }

    let mut remaining = PackedAccounts::default();
    let mut packed_inputs = Vec::with_capacity(params.inputs.len());
    for (account, root_index) in params.inputs.iter().zip(&params.proof.root_indices) {
        let merkle_tree_pubkey_index = remaining.insert_or_get(account.tree_info.tree)?;
        let queue_pubkey_index = remaining.insert_or_get(account.tree_info.queue)?;
        packed_inputs.push(PackedCompressedAccountWithMerkleContext {
            compressed_account: CompressedAccountLayout::from(account),
            merkle_context: PackedMerkleContext {
                merkle_tree_pubkey_index,
                queue_pubkey_index,
                leaf_index: account.leaf_index,
                prove_by_index: account.prove_by_index,
            },
            root_index: if account.prove_by_index { 0 } else { *root_index },
            read_only: false,
        });
    }

    let change = total - params.lamports;
    let mut outputs = Vec::new();
    if change > 0 {
        let index = remaining.insert_or_get(first.tree_info.output_tree().tree)?;
        outputs.push(output_account(&params.authority, change, index));
    }

    let data = InstructionDataInvoke {
        proof: params.proof.compressed_proof.as_ref().map(CompressedProofData::from),
        input_compressed_accounts_with_merkle_context: packed_inputs,
        output_compressed_accounts: outputs,
        relay_fee: None,
        new_address_params: Vec::new(),
        compress_or_decompress_lamports: Some(params.lamports),
        is_compress: false,
    }
    .encode()?;

    Ok(Instruction {
        program_id: LIGHT_SYSTEM_PROGRAM_ID,
        accounts: invoke_accounts(
            params.fee_payer,
            params.authority,
            Some(params.recipient),
            remaining,
        ),
        data,
    })
}
