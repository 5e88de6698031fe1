//! Unshield the whole stealth balance

use anyhow::{Context, Result};
use colored::Colorize;
use nudge_engine::unshield::UnshieldBuilder;
use nudge_engine::{DataPath, EngineConfig, LedgerConnections};
use solana_sdk::{native_token::lamports_to_sol, pubkey::Pubkey, signer::Signer};

use crate::config::{load_solana_keypair, stealth_identity};

pub async fn run(
    config: EngineConfig,
    keypair_path: Option<&str>,
    to: Option<&str>,
    proxy: bool,
) -> Result<()> {
    println!("{}", "Preparing withdrawal...".cyan());

    let wallet = load_solana_keypair(keypair_path)?;
    let stealth = stealth_identity(&wallet)?;
    let destination: Pubkey = match to {
        Some(address) => address.parse().context("Invalid destination address")?,
        None => wallet.pubkey(),
    };

    let path = if proxy { DataPath::Proxy } else { DataPath::Direct };
    let connections = LedgerConnections::new(config);
    let source = connections.shielded_source(path)?;

    let mut withdrawal = UnshieldBuilder::new(&connections, source)
        .build_withdrawal(&stealth, &destination, &wallet.pubkey())
        .await?;

    println!(
        "Unshielding {} SOL from {} account(s) to {}",
        lamports_to_sol(withdrawal.total_lamports),
        withdrawal.spent_accounts.len(),
        destination
    );

    // Both the stealth authority and the fee payer must sign
    withdrawal.sign_stealth()?;
    withdrawal.transaction.sign(&wallet)?;
    let signature = connections.submit(withdrawal.transaction).await?;

    println!();
    println!("{}", "Withdrawal confirmed".green().bold());
    println!("  Signature: {}", signature);

    Ok(())
}
