//! Shielded deposits: compress lamports into a stealth address

use std::str::FromStr;

use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tracing::info;

use crate::connection::LedgerConnections;
use crate::deadline::with_deadline;
use crate::error::EngineError;
use crate::instruction;
use crate::transaction::UnsignedTransaction;
use crate::tree::select_state_tree;

/// A validated deposit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRequest {
    pub recipient: Pubkey,
    pub lamports: u64,
}

/// Validate a deposit without touching the network.
///
/// Checks run in a fixed order: amount, minimum, then recipient address.
pub fn validate_deposit(
    recipient: &str,
    amount_sol: f64,
    min_lamports: u64,
) -> Result<DepositRequest, EngineError> {
    if !amount_sol.is_finite() || amount_sol <= 0.0 {
        return Err(EngineError::InvalidAmount);
    }
    let lamports = (amount_sol * LAMPORTS_PER_SOL as f64).floor();
    if lamports < min_lamports as f64 {
        return Err(EngineError::AmountTooSmall {
            minimum: min_lamports,
        });
    }
    if lamports > u64::MAX as f64 {
        return Err(EngineError::InvalidAmount);
    }
    let recipient = Pubkey::from_str(recipient.trim())
        .map_err(|_| EngineError::InvalidAddress(recipient.to_string()))?;

    Ok(DepositRequest {
        recipient,
        lamports: lamports as u64,
    })
}

pub struct DepositBuilder<'a> {
    connections: &'a LedgerConnections,
}

impl<'a> DepositBuilder<'a> {
    pub fn new(connections: &'a LedgerConnections) -> Self {
        Self { connections }
    }

    /// Build an unsigned transaction moving `amount_sol` from `payer` into a
    /// new compressed account owned by `recipient`. Only `payer` signs.
    pub async fn build_deposit(
        &self,
        payer: &Pubkey,
        recipient: &str,
        amount_sol: f64,
    ) -> Result<UnsignedTransaction, EngineError> {
        let request = validate_deposit(
            recipient,
            amount_sol,
            self.connections.config().min_deposit_lamports,
        )?;

        let deadlines = self.connections.deadlines();
        let ledger = self.connections.standard_client()?;
        let compression = self.connections.compression_client()?;

        let blockhash =
            with_deadline("blockhash fetch", deadlines.rpc(), ledger.latest_blockhash()).await?;
        let trees =
            with_deadline("state tree lookup", deadlines.rpc(), compression.state_trees()).await?;
        let tree = select_state_tree(&trees)?;

        let ix = instruction::compress(payer, &request.recipient, request.lamports, &tree)?;
        let transaction = UnsignedTransaction::compile(payer, &[ix], blockhash)?;

        info!(
            payer = %payer,
            recipient = %request.recipient,
            lamports = request.lamports,
            tree = %tree.tree,
            "built shielded deposit"
        );
        Ok(transaction)
    }
}
